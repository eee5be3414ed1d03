//! Storage traits and error types

use crate::crawler::PageRecord;
use crate::storage::{RunRecord, RunStatus, Snapshot, StoredPage};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// The crawl engine never touches storage directly; the record consumer
/// saves what it receives.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new crawl run and returns its id
    fn create_run(&mut self, seed: &str, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Marks a run as finished with the given status
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    // ===== Page Management =====

    /// Saves a page record
    ///
    /// Updates the existing row for the URL or inserts a new one, appends a
    /// snapshot, and records saved media paths. All in one transaction.
    fn save_record(&mut self, run_id: i64, record: &PageRecord) -> StorageResult<()>;

    /// Gets a page by URL
    fn get_page_by_url(&self, url: &str) -> StorageResult<Option<StoredPage>>;

    /// Lists all pages ordered by URL
    fn list_pages(&self) -> StorageResult<Vec<StoredPage>>;

    /// Lists media paths saved for a page
    fn media_for_page(&self, url: &str) -> StorageResult<Vec<String>>;

    // ===== History =====

    /// Gets the newest snapshot for a URL
    fn latest_snapshot(&self, url: &str) -> StorageResult<Option<Snapshot>>;

    /// Gets all snapshots for a URL, newest first
    fn snapshots_for(&self, url: &str) -> StorageResult<Vec<Snapshot>>;

    /// URLs with more than one snapshot
    fn urls_with_history(&self) -> StorageResult<Vec<String>>;

    // ===== Statistics =====

    fn count_pages(&self) -> StorageResult<u64>;

    fn count_pages_for_run(&self, run_id: i64) -> StorageResult<u64>;

    fn count_unique_domains(&self) -> StorageResult<u64>;

    fn count_snapshots(&self) -> StorageResult<u64>;

    fn count_media(&self) -> StorageResult<u64>;

    /// Page counts keyed by crawl depth
    fn get_depth_breakdown(&self) -> StorageResult<HashMap<u32, u64>>;
}
