//! Crawl engine
//!
//! This module contains the core crawling logic, including:
//! - Page fetching through interchangeable strategies (HTTP or browser)
//! - HTML extraction and link discovery
//! - The bounded work queue and worker pool
//! - Sitemap seeding, media downloads and job state
//!
//! [`start_crawl`] is the entry point. It validates its inputs, builds the
//! fetcher, and returns a [`CrawlHandle`] that streams [`PageRecord`]s while
//! the crawl runs in the background.

mod extractor;
mod fetcher;
mod job;
mod media;
mod record;
mod scheduler;
mod sitemap;

pub use extractor::{extract, snippet, ExtractedPage, DEFAULT_TITLE, SNIPPET_CHARS};
pub use fetcher::{
    build_http_client, FetchError, FetchedPage, FetcherKind, HttpFetcher, PageFetcher,
    RenderFetcher, RetryPolicy,
};
pub use job::{CrawlJob, JobRegistry, JobSnapshot, JobStatus};
pub use media::MediaDownloader;
pub use record::PageRecord;
pub use scheduler::CrawlReport;
pub use sitemap::{expand_sitemap, MAX_SITEMAP_URLS};

use crate::config::{validate_seed, Config, FetchConfig, MediaConfig, RenderConfig};
use crate::policy::ScopePolicy;
use crate::robots::RobotsCache;
use crate::state::{CrawlTask, StatePaths, TaskOutcome, VisitedSet};
use crate::url::{claim_key, extract_domain, is_sitemap_url};
use crate::{ConfigError, DriftnetError, Result, UrlError};
use scheduler::{run_workers, CrawlContext, WorkQueue};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Capacity of the record stream; workers wait when the consumer lags
const RECORD_BUFFER: usize = 256;

/// Settings for one crawl beyond the traversal parameters
#[derive(Debug, Clone, Default)]
pub struct CrawlOptions {
    pub fetch: FetchConfig,
    pub render: RenderConfig,
    pub media: MediaConfig,

    /// Directory for per-domain visited and frontier files; None keeps the
    /// visited set in memory only
    pub state_dir: Option<PathBuf>,

    /// Discard persisted state before starting
    pub fresh: bool,

    /// External cancellation; a fresh token is used when left default
    pub cancel: CancellationToken,
}

impl CrawlOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            fetch: config.fetch.clone(),
            render: config.render.clone(),
            media: config.media.clone(),
            state_dir: config.output.state_dir.as_ref().map(PathBuf::from),
            fresh: false,
            cancel: CancellationToken::new(),
        }
    }
}

/// A running crawl
///
/// Records arrive on [`CrawlHandle::records`] as pages are extracted. The
/// stream ends when the crawl finishes.
pub struct CrawlHandle {
    pub records: mpsc::Receiver<PageRecord>,
    job: Arc<CrawlJob>,
    task: JoinHandle<Result<CrawlReport>>,
}

impl CrawlHandle {
    pub fn job(&self) -> &Arc<CrawlJob> {
        &self.job
    }

    /// Stops dispatching new tasks; in-flight tasks finish normally
    pub fn cancel(&self) {
        self.job.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.job.cancellation_token()
    }

    pub async fn next_record(&mut self) -> Option<PageRecord> {
        self.records.recv().await
    }

    /// Waits for the crawl to end, discarding records not yet received
    pub async fn join(self) -> Result<CrawlReport> {
        let CrawlHandle { records, task, .. } = self;
        drop(records);
        task.await?
    }

    /// Receives every record, then waits for the crawl report
    pub async fn collect(mut self) -> Result<(Vec<PageRecord>, CrawlReport)> {
        let mut records = Vec::new();
        while let Some(record) = self.records.recv().await {
            records.push(record);
        }
        let report = self.task.await??;
        Ok((records, report))
    }
}

/// Starts a crawl from `seed`
///
/// Fails only when the crawl cannot meaningfully run: an unparsable seed,
/// zero concurrency, or a fetcher that cannot be built. Everything that goes
/// wrong after that is logged and counted in the [`CrawlReport`].
pub async fn start_crawl(
    seed: &str,
    policy: ScopePolicy,
    max_depth: u32,
    max_concurrency: usize,
    fetcher: FetcherKind,
    options: CrawlOptions,
) -> Result<CrawlHandle> {
    check_inputs(seed, max_concurrency)?;
    let fetcher = fetcher.build(&options.fetch, &options.render).await?;
    start_crawl_with_fetcher(seed, policy, max_depth, max_concurrency, fetcher, options).await
}

/// Starts a crawl with a caller-supplied fetcher
pub async fn start_crawl_with_fetcher(
    seed: &str,
    policy: ScopePolicy,
    max_depth: u32,
    max_concurrency: usize,
    fetcher: Arc<dyn PageFetcher>,
    options: CrawlOptions,
) -> Result<CrawlHandle> {
    let (seed_url, seed_domain) = check_inputs(seed, max_concurrency)?;
    let client = build_http_client(&options.fetch)?;

    let (visited, resumed) = open_state(options.state_dir.as_ref(), &seed_domain, options.fresh);
    let visited = Arc::new(visited);

    let robots = if policy.respect_robots {
        Some(RobotsCache::new(
            client.clone(),
            options.fetch.robots_agent.clone(),
        ))
    } else {
        None
    };
    let media = if options.media.enabled {
        Some(MediaDownloader::new(client.clone(), &options.media))
    } else {
        None
    };

    let cancel = options.cancel.clone();
    let job = Arc::new(CrawlJob::new(seed_url.as_str(), cancel.clone()));
    let (records_tx, records_rx) = mpsc::channel(RECORD_BUFFER);

    let ctx = Arc::new(CrawlContext {
        seed_key: claim_key(seed_url.as_str()),
        seed_domain,
        policy,
        max_depth,
        fetcher,
        robots,
        media,
        visited,
        records: records_tx,
        job: Arc::clone(&job),
        outcomes: Mutex::new(BTreeMap::new()),
    });

    let task = tokio::spawn(run_crawl(
        ctx,
        client,
        seed_url,
        resumed,
        max_concurrency,
        cancel,
    ));

    Ok(CrawlHandle {
        records: records_rx,
        job,
        task,
    })
}

fn check_inputs(seed: &str, max_concurrency: usize) -> Result<(url::Url, String)> {
    let seed_url = validate_seed(seed)?;
    let seed_domain = extract_domain(&seed_url).ok_or(UrlError::MissingDomain)?;

    if max_concurrency == 0 {
        return Err(DriftnetError::Config(ConfigError::Validation(
            "max_concurrency must be at least 1".to_string(),
        )));
    }

    Ok((seed_url, seed_domain))
}

/// Opens the per-domain state, falling back to memory when it cannot be used
fn open_state(
    state_dir: Option<&PathBuf>,
    domain: &str,
    fresh: bool,
) -> (VisitedSet, Vec<CrawlTask>) {
    let state_dir = match state_dir {
        Some(dir) => dir,
        None => return (VisitedSet::in_memory(), Vec::new()),
    };

    let paths = StatePaths::for_domain(state_dir, domain);
    if fresh {
        if let Err(e) = VisitedSet::discard(&paths) {
            warn!("Failed to discard state {}: {}", paths.visited.display(), e);
        }
    }

    match VisitedSet::open(paths.clone()) {
        Ok((visited, frontier)) => {
            if !visited.is_empty() || !frontier.is_empty() {
                info!(
                    "Resuming from {}: {} URLs already visited, {} queued",
                    paths.visited.display(),
                    visited.len(),
                    frontier.len()
                );
            }
            (visited, frontier)
        }
        Err(e) => {
            warn!(
                "Failed to open state {}: {}; continuing without persistence",
                paths.visited.display(),
                e
            );
            (VisitedSet::in_memory(), Vec::new())
        }
    }
}

async fn run_crawl(
    ctx: Arc<CrawlContext>,
    client: reqwest::Client,
    seed_url: url::Url,
    resumed: Vec<CrawlTask>,
    max_concurrency: usize,
    cancel: CancellationToken,
) -> Result<CrawlReport> {
    let start_time = Instant::now();
    ctx.job.set_status(JobStatus::Running);

    let seeds: Vec<String> = if is_sitemap_url(&seed_url) {
        info!("Expanding sitemap {}", seed_url);
        expand_sitemap(&client, seed_url.as_str()).await
    } else {
        vec![seed_url.to_string()]
    };

    let queue = Arc::new(WorkQueue::new());
    for task in seeds
        .into_iter()
        .map(|url| CrawlTask::new(url, 0))
        .chain(resumed)
    {
        let key = claim_key(&task.url);
        if ctx.visited.is_claimed(&key) {
            continue;
        }
        ctx.visited.mark_pending(&key, &task);
        queue.push(task);
    }
    queue.close_if_idle();

    info!(
        "Starting crawl of {} with {} workers, max depth {}, {} tasks queued",
        seed_url,
        max_concurrency,
        ctx.max_depth,
        queue.outstanding()
    );

    let joined = run_workers(
        Arc::clone(&ctx),
        Arc::clone(&queue),
        max_concurrency,
        cancel.clone(),
    )
    .await;

    ctx.visited.finish();
    ctx.fetcher.shutdown().await;

    if let Err(e) = joined {
        ctx.job.set_status(JobStatus::Failed);
        return Err(e.into());
    }

    let cancelled = cancel.is_cancelled();
    let outcomes = ctx.outcome_counts();
    let report = CrawlReport {
        records_emitted: outcomes
            .get(&TaskOutcome::Emitted)
            .copied()
            .unwrap_or(0),
        outcomes,
        cancelled,
        elapsed: start_time.elapsed(),
        claimed: ctx.visited.len(),
        frontier_remaining: ctx.visited.pending_tasks().len(),
    };

    ctx.job.set_status(if cancelled {
        JobStatus::Cancelled
    } else {
        JobStatus::Completed
    });

    info!(
        "Crawl finished: {} records, {} failures, {} tasks processed in {:?}{}",
        report.records_emitted,
        report.failures(),
        report.processed(),
        report.elapsed,
        if cancelled { " (cancelled)" } else { "" }
    );

    Ok(report)
}
