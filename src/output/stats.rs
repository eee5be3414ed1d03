//! Statistics generation from the result store
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the storage layer.

use crate::storage::{RunRecord, Storage, StorageResult};
use std::collections::HashMap;

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Distinct URLs stored
    pub total_pages: u64,

    /// Number of unique domains encountered
    pub unique_domains: u64,

    /// Stored page versions across all runs
    pub total_snapshots: u64,

    /// Media files recorded
    pub total_media: u64,

    /// URLs with more than one snapshot
    pub urls_with_history: u64,

    /// Depth -> page count
    pub depth_breakdown: HashMap<u32, u64>,

    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from storage
pub fn load_statistics(storage: &dyn Storage) -> StorageResult<CrawlStatistics> {
    Ok(CrawlStatistics {
        total_pages: storage.count_pages()?,
        unique_domains: storage.count_unique_domains()?,
        total_snapshots: storage.count_snapshots()?,
        total_media: storage.count_media()?,
        urls_with_history: storage.urls_with_history()?.len() as u64,
        depth_breakdown: storage.get_depth_breakdown()?,
        latest_run: storage.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    if let Some(run) = &stats.latest_run {
        println!("Latest Run:");
        println!("  Run ID: {}", run.id);
        println!("  Seed: {}", run.seed);
        println!("  Started: {}", run.started_at);
        if let Some(finished) = &run.finished_at {
            println!("  Finished: {}", finished);
        }
        println!("  Status: {}", run.status.to_db_string());
        println!();
    }

    println!("Overview:");
    println!("  Pages stored: {}", stats.total_pages);
    println!("  Unique domains: {}", stats.unique_domains);
    println!("  Snapshots: {}", stats.total_snapshots);
    println!("  Media files: {}", stats.total_media);
    println!("  URLs with history: {}", stats.urls_with_history);
    println!();

    if !stats.depth_breakdown.is_empty() {
        println!("Pages by Depth:");
        let mut depths: Vec<_> = stats.depth_breakdown.iter().collect();
        depths.sort_by_key(|(depth, _)| **depth);

        for (depth, count) in depths {
            let percentage = if stats.total_pages > 0 {
                (*count as f64 / stats.total_pages as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", depth, count, percentage);
        }
        println!();
    }
}
