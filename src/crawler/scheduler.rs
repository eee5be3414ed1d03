//! Work queue and worker pool
//!
//! A fixed pool of workers pulls `(url, depth)` tasks from one shared queue.
//! Each task is checked against the visited set and the scope policy,
//! fetched, extracted, emitted as a record, and its in-scope links are pushed
//! back onto the same queue one level deeper.
//!
//! The crawl ends when the number of outstanding tasks (queued or in flight)
//! drops to zero, or when the cancellation token fires.

use crate::crawler::extractor::extract;
use crate::crawler::fetcher::PageFetcher;
use crate::crawler::job::CrawlJob;
use crate::crawler::media::MediaDownloader;
use crate::crawler::PageRecord;
use crate::policy::{is_in_scope, ScopePolicy};
use crate::robots::RobotsCache;
use crate::state::{CrawlTask, TaskOutcome, VisitedSet};
use crate::url::claim_key;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Summary of a finished crawl
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    /// How many dequeued tasks ended in each outcome
    pub outcomes: BTreeMap<TaskOutcome, u64>,

    pub records_emitted: u64,

    /// True if the crawl stopped on cancellation rather than exhaustion
    pub cancelled: bool,

    pub elapsed: Duration,

    /// Claimed URLs, including those from earlier runs of a resumed crawl
    pub claimed: usize,

    /// Tasks queued but never claimed, saved for a resumed crawl
    pub frontier_remaining: usize,
}

impl CrawlReport {
    pub fn count(&self, outcome: TaskOutcome) -> u64 {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }

    /// Total dequeued tasks
    pub fn processed(&self) -> u64 {
        self.outcomes.values().sum()
    }

    pub fn failures(&self) -> u64 {
        self.outcomes
            .iter()
            .filter(|(outcome, _)| outcome.is_failure())
            .map(|(_, count)| count)
            .sum()
    }
}

/// Shared FIFO of crawl tasks with an outstanding-task counter
pub(crate) struct WorkQueue {
    tx: mpsc::UnboundedSender<CrawlTask>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<CrawlTask>>,
    outstanding: AtomicUsize,
    drained: CancellationToken,
}

impl WorkQueue {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: tokio::sync::Mutex::new(rx),
            outstanding: AtomicUsize::new(0),
            drained: CancellationToken::new(),
        }
    }

    pub(crate) fn push(&self, task: CrawlTask) {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        // The receiver lives as long as the queue, so sending cannot fail.
        let _ = self.tx.send(task);
    }

    async fn pop(&self) -> Option<CrawlTask> {
        self.rx.lock().await.recv().await
    }

    /// Marks one popped task as finished
    fn task_done(&self) {
        if self.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.drained.cancel();
        }
    }

    /// Ends the crawl immediately if nothing was ever queued
    pub(crate) fn close_if_idle(&self) {
        if self.outstanding.load(Ordering::SeqCst) == 0 {
            self.drained.cancel();
        }
    }

    pub(crate) fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }
}

/// Everything a worker needs, shared by the whole pool
pub(crate) struct CrawlContext {
    pub(crate) seed_key: String,
    pub(crate) seed_domain: String,
    pub(crate) policy: ScopePolicy,
    pub(crate) max_depth: u32,
    pub(crate) fetcher: Arc<dyn PageFetcher>,
    pub(crate) robots: Option<RobotsCache>,
    pub(crate) media: Option<MediaDownloader>,
    pub(crate) visited: Arc<VisitedSet>,
    pub(crate) records: mpsc::Sender<PageRecord>,
    pub(crate) job: Arc<CrawlJob>,
    pub(crate) outcomes: Mutex<BTreeMap<TaskOutcome, u64>>,
}

impl CrawlContext {
    fn record_outcome(&self, outcome: TaskOutcome) {
        *self
            .outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(outcome)
            .or_insert(0) += 1;
        self.job.record_outcome(outcome);
    }

    pub(crate) fn outcome_counts(&self) -> BTreeMap<TaskOutcome, u64> {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Runs `workers` tasks over the queue until it drains or `cancel` fires
pub(crate) async fn run_workers(
    ctx: Arc<CrawlContext>,
    queue: Arc<WorkQueue>,
    workers: usize,
    cancel: CancellationToken,
) -> Result<(), tokio::task::JoinError> {
    let mut handles = Vec::with_capacity(workers);
    for worker_id in 0..workers {
        let ctx = Arc::clone(&ctx);
        let queue = Arc::clone(&queue);
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            worker(worker_id, ctx, queue, cancel).await;
        }));
    }

    for handle in handles {
        handle.await?;
    }
    Ok(())
}

async fn worker(
    worker_id: usize,
    ctx: Arc<CrawlContext>,
    queue: Arc<WorkQueue>,
    cancel: CancellationToken,
) {
    debug!("Worker {} started", worker_id);

    loop {
        let task = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = queue.drained.cancelled() => break,
            task = queue.pop() => match task {
                Some(task) => task,
                None => break,
            },
        };

        let outcome = process_task(&ctx, &queue, task).await;
        ctx.record_outcome(outcome);
        queue.task_done();
    }

    debug!("Worker {} stopped", worker_id);
}

/// Handles one task from dequeue to emission
async fn process_task(ctx: &CrawlContext, queue: &WorkQueue, task: CrawlTask) -> TaskOutcome {
    let key = claim_key(&task.url);

    if task.depth > ctx.max_depth {
        debug!("Depth {} exceeds limit for {}", task.depth, task.url);
        ctx.visited.forget_pending(&key);
        return TaskOutcome::DepthExceeded;
    }

    let url = match Url::parse(&task.url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => url,
        _ => {
            warn!("Skipping malformed URL: {}", task.url);
            ctx.visited.forget_pending(&key);
            return TaskOutcome::Malformed;
        }
    };

    if !ctx.visited.claim(&key) {
        debug!("Already visited: {}", url);
        return TaskOutcome::AlreadyClaimed;
    }

    if ctx.policy.respect_robots {
        if let Some(robots) = &ctx.robots {
            if !robots.is_allowed(&url).await {
                return TaskOutcome::RobotsBlocked;
            }
        }
    }

    if !ctx.policy.passes_keyword(url.as_str(), key == ctx.seed_key) {
        debug!("Keyword filter rejected {}", url);
        return TaskOutcome::KeywordFiltered;
    }

    info!("Crawling: {} (depth {})", url, task.depth);
    let fetched = match ctx.fetcher.fetch(&url).await {
        Ok(fetched) => fetched,
        Err(e) => {
            warn!("Failed to crawl {}: {}", url, e);
            return TaskOutcome::FetchFailed;
        }
    };

    let base_url = Url::parse(&fetched.final_url).unwrap_or_else(|_| url.clone());
    let extracted = extract(&fetched.raw_content, &base_url);

    let media_refs = match &ctx.media {
        Some(media) => {
            let mut candidates = extracted.media_candidates;
            for resource in fetched.resource_urls {
                if !candidates.contains(&resource) {
                    candidates.push(resource);
                }
            }
            media.download_all(&candidates).await
        }
        None => Vec::new(),
    };

    let record = PageRecord {
        url: task.url.clone(),
        final_url: fetched.final_url,
        depth: task.depth,
        title: extracted.title,
        text_snippet: extracted.text_snippet,
        links: extracted.links,
        media_refs,
        rendered_content: extracted.rendered_content,
        content_type: fetched.content_type,
        screenshot: fetched.screenshot,
        fetched_at: Utc::now(),
    };

    let children = if task.depth < ctx.max_depth {
        scoped_links(&record.links, &ctx.policy, &ctx.seed_domain)
    } else {
        Vec::new()
    };

    if ctx.records.send(record).await.is_err() {
        debug!("Record receiver dropped; discarding record for {}", url);
    }

    for link in children {
        let child_key = claim_key(&link);
        if ctx.visited.is_claimed(&child_key) {
            continue;
        }
        let child = CrawlTask::new(link, task.depth + 1);
        ctx.visited.mark_pending(&child_key, &child);
        queue.push(child);
    }

    TaskOutcome::Emitted
}

/// Links eligible for traversal; the record keeps the full list
fn scoped_links(links: &[String], policy: &ScopePolicy, seed_domain: &str) -> Vec<String> {
    links
        .iter()
        .filter(|link| {
            Url::parse(link)
                .map(|candidate| is_in_scope(&candidate, policy, seed_domain))
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}
