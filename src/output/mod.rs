//! Output module for consuming crawl records and reporting on them
//!
//! This module handles:
//! - Saving streamed page records with change detection
//! - Generating markdown summaries of crawl results
//! - Exporting stored pages as JSON or CSV
//! - Printing store statistics

mod export;
mod markdown;
mod sqlite_output;
pub mod stats;
mod traits;

pub use export::{export_pages, ExportFormat};
pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use sqlite_output::SqliteSink;
pub use stats::{load_statistics, print_statistics, CrawlStatistics};
pub use traits::{CrawlSummary, OutputError, OutputResult, RecordSink};

use crate::crawler::CrawlReport;
use crate::storage::Storage;
use chrono::{DateTime, Utc};

/// Generates a summary of the latest run from storage
///
/// Task outcome counts only exist in memory, so they are included when the
/// run's [`CrawlReport`] is passed in.
pub fn generate_summary(
    storage: &dyn Storage,
    report: Option<&CrawlReport>,
) -> OutputResult<CrawlSummary> {
    let run = storage.get_latest_run()?.ok_or(OutputError::NoRuns)?;

    let duration_seconds = match (
        run.started_at.parse::<DateTime<Utc>>(),
        run.finished_at
            .as_deref()
            .map(|f| f.parse::<DateTime<Utc>>()),
    ) {
        (Ok(started), Some(Ok(finished))) => {
            Some((finished - started).num_seconds().max(0) as u64)
        }
        _ => None,
    };

    let stats = stats::load_statistics(storage)?;

    let outcomes = report
        .map(|r| {
            r.outcomes
                .iter()
                .map(|(outcome, count)| (outcome.to_db_string().to_string(), *count))
                .collect()
        })
        .unwrap_or_default();

    Ok(CrawlSummary {
        run_id: run.id,
        seed: run.seed,
        started_at: run.started_at,
        finished_at: run.finished_at,
        duration_seconds,
        status: run.status.to_db_string().to_string(),
        config_hash: run.config_hash,
        total_pages: stats.total_pages,
        pages_this_run: storage.count_pages_for_run(run.id)?,
        unique_domains: stats.unique_domains,
        total_snapshots: stats.total_snapshots,
        total_media: stats.total_media,
        depth_breakdown: stats.depth_breakdown,
        changed_urls: storage.urls_with_history()?,
        outcomes,
    })
}
