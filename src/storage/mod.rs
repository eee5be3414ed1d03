//! Storage module for persisting crawl results
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Page upserts keyed by URL
//! - Snapshot history for change detection
//! - Run tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use serde::Serialize;

/// The latest stored version of a crawled page
#[derive(Debug, Clone, Serialize)]
pub struct StoredPage {
    pub id: i64,
    pub url: String,
    pub final_url: String,
    pub domain: String,
    pub title: String,
    pub content_snippet: String,
    pub rendered_content: Option<String>,
    pub content_type: Option<String>,
    pub depth: u32,
    pub link_count: u32,
    pub fetched_at: String,
    pub updated_at: String,
    pub run_id: i64,
}

/// One historical version of a page
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub content_snippet: String,
    pub created_at: String,
    pub run_id: i64,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub seed: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
