//! Record sink trait and summary types
//!
//! The crawl engine streams page records; a [`RecordSink`] is what consumes
//! them on the caller's side.

use crate::change::ChangeRecord;
use crate::crawler::PageRecord;
use crate::storage::{RunStatus, StorageError};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),

    #[error("No crawl runs found in database")]
    NoRuns,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Summary statistics for a crawl run
#[derive(Debug, Clone, Default)]
pub struct CrawlSummary {
    // Run metadata
    pub run_id: i64,
    pub seed: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub duration_seconds: Option<u64>,
    pub status: String,
    pub config_hash: String,

    // Stored data
    pub total_pages: u64,
    pub pages_this_run: u64,
    pub unique_domains: u64,
    pub total_snapshots: u64,
    pub total_media: u64,

    /// Depth -> stored page count
    pub depth_breakdown: HashMap<u32, u64>,

    /// URLs with more than one stored snapshot
    pub changed_urls: Vec<String>,

    /// Task outcome -> count, when the run's report is available
    pub outcomes: BTreeMap<String, u64>,
}

impl CrawlSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total tasks counted in `outcomes`
    pub fn tasks_processed(&self) -> u64 {
        self.outcomes.values().sum()
    }

    /// Share of fetch attempts that produced a record, as a percentage
    pub fn success_rate(&self) -> f64 {
        let emitted = self.outcomes.get("emitted").copied().unwrap_or(0);
        let failed = self.outcomes.get("fetch_failed").copied().unwrap_or(0);
        let attempted = emitted + failed;
        if attempted == 0 {
            return 0.0;
        }
        (emitted as f64 / attempted as f64) * 100.0
    }
}

/// Consumer of the crawl's record stream
pub trait RecordSink {
    /// Stores one record, returning how it differs from the stored history
    fn record(&mut self, record: &PageRecord) -> OutputResult<ChangeRecord>;

    /// Marks the run finished
    fn finalize(&mut self, status: RunStatus) -> OutputResult<()>;
}
