//! Crawl job state
//!
//! A [`CrawlJob`] is the handle shared between a running crawl and whoever
//! watches it. The [`JobRegistry`] keeps jobs addressable by id until they
//! are purged.

use crate::crawler::{start_crawl, CrawlHandle, CrawlOptions, FetcherKind};
use crate::policy::ScopePolicy;
use crate::state::TaskOutcome;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Lifecycle of a crawl job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared state of one crawl
pub struct CrawlJob {
    id: Uuid,
    seed: String,
    created_at: DateTime<Utc>,
    status: RwLock<JobStatus>,
    processed: AtomicU64,
    emitted: AtomicU64,
    failed: AtomicU64,
    cancel: CancellationToken,
}

/// Point-in-time view of a job
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: Uuid,
    pub seed: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub processed: u64,
    pub emitted: u64,
    pub failed: u64,
}

impl CrawlJob {
    pub fn new(seed: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            id: Uuid::new_v4(),
            seed: seed.into(),
            created_at: Utc::now(),
            status: RwLock::new(JobStatus::Pending),
            processed: AtomicU64::new(0),
            emitted: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            cancel,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn status(&self) -> JobStatus {
        *self.status.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_status(&self, status: JobStatus) {
        *self.status.write().unwrap_or_else(PoisonError::into_inner) = status;
    }

    /// Counts a finished task
    pub(crate) fn record_outcome(&self, outcome: TaskOutcome) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        if outcome.is_success() {
            self.emitted.fetch_add(1, Ordering::Relaxed);
        } else if outcome.is_failure() {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Stops dispatching new tasks; in-flight tasks still finish
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            seed: self.seed.clone(),
            status: self.status(),
            created_at: self.created_at,
            processed: self.processed.load(Ordering::Relaxed),
            emitted: self.emitted.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Jobs addressable by id
#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<Uuid, Arc<CrawlJob>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a crawl and registers its job
    pub async fn submit(
        &self,
        seed: &str,
        policy: ScopePolicy,
        max_depth: u32,
        max_concurrency: usize,
        fetcher: FetcherKind,
        options: CrawlOptions,
    ) -> Result<CrawlHandle> {
        let handle = start_crawl(seed, policy, max_depth, max_concurrency, fetcher, options).await?;
        self.register(Arc::clone(handle.job()));
        Ok(handle)
    }

    pub fn register(&self, job: Arc<CrawlJob>) {
        self.lock().insert(job.id(), job);
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<CrawlJob>> {
        self.lock().get(&id).cloned()
    }

    /// Snapshots of all jobs, oldest first
    pub fn list(&self) -> Vec<JobSnapshot> {
        let mut snapshots: Vec<JobSnapshot> =
            self.lock().values().map(|job| job.snapshot()).collect();
        snapshots.sort_by_key(|s| s.created_at);
        snapshots
    }

    /// Cancels a job by id, returning false if it is unknown
    pub fn cancel(&self, id: Uuid) -> bool {
        match self.get(id) {
            Some(job) => {
                job.cancel();
                true
            }
            None => false,
        }
    }

    /// Drops finished jobs, returning how many were removed
    pub fn purge_finished(&self) -> usize {
        let mut jobs = self.lock();
        let before = jobs.len();
        jobs.retain(|_, job| !job.status().is_terminal());
        before - jobs.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Arc<CrawlJob>>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
