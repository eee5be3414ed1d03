//! Visited set with optional on-disk persistence
//!
//! The set records every URL claimed by a crawl. When persistence is enabled,
//! two plain-text files live in the state directory for each seed domain:
//!
//! - `{domain}.state`: one claimed URL per line, appended at claim time
//! - `{domain}.frontier`: `depth<TAB>url` lines for tasks that were queued but
//!   not yet claimed, rewritten at checkpoints and removed when a crawl drains
//!
//! A URL is recorded as claimed before it is fetched. A crawl interrupted
//! mid-fetch will not retry that URL when resumed.
//!
//! Cancellation and normal completion always write the frontier. A hard crash
//! (kill, power loss) only leaves the frontier from the last checkpoint, so
//! links discovered after it are lost: they were never claimed, and the pages
//! that linked to them are claimed and will not be fetched again.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Claims between frontier checkpoints, which bounds what a hard crash loses
const CHECKPOINT_INTERVAL: usize = 25;

/// A unit of crawl work: a URL and its link distance from the seed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    pub url: String,
    pub depth: u32,
}

impl CrawlTask {
    pub fn new(url: impl Into<String>, depth: u32) -> Self {
        Self {
            url: url.into(),
            depth,
        }
    }
}

/// Locations of the persisted files for one domain
#[derive(Debug, Clone)]
pub struct StatePaths {
    pub visited: PathBuf,
    pub frontier: PathBuf,
}

impl StatePaths {
    pub fn for_domain(state_dir: &Path, domain: &str) -> Self {
        let stem: String = domain
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        Self {
            visited: state_dir.join(format!("{}.state", stem)),
            frontier: state_dir.join(format!("{}.frontier", stem)),
        }
    }
}

struct Journal {
    paths: StatePaths,
    file: File,
}

#[derive(Default)]
struct Inner {
    claimed: HashSet<String>,
    pending: HashMap<String, CrawlTask>,
    journal: Option<Journal>,
    claims_since_checkpoint: usize,
}

/// Set of claimed URL keys shared by all crawl workers
///
/// The claim check and the journal append happen under one lock, so a URL is
/// claimed by exactly one task across the whole crawl.
#[derive(Default)]
pub struct VisitedSet {
    inner: Mutex<Inner>,
}

impl VisitedSet {
    /// Creates a set that lives only in memory
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens persisted state, returning the set and any saved frontier tasks
    ///
    /// Missing files are treated as an empty state. Frontier tasks whose URL
    /// is already claimed are dropped.
    pub fn open(paths: StatePaths) -> io::Result<(Self, Vec<CrawlTask>)> {
        if let Some(parent) = paths.visited.parent() {
            fs::create_dir_all(parent)?;
        }

        let claimed = read_claimed(&paths.visited)?;
        let frontier: Vec<CrawlTask> = read_frontier(&paths.frontier)?
            .into_iter()
            .filter(|task| !claimed.contains(&task.url))
            .collect();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&paths.visited)?;

        debug!(
            "Loaded {} claimed URLs and {} frontier tasks from {}",
            claimed.len(),
            frontier.len(),
            paths.visited.display()
        );

        let set = Self {
            inner: Mutex::new(Inner {
                claimed,
                journal: Some(Journal { paths, file }),
                ..Inner::default()
            }),
        };
        Ok((set, frontier))
    }

    /// Removes persisted state so the next crawl starts fresh
    pub fn discard(paths: &StatePaths) -> io::Result<()> {
        for path in [&paths.visited, &paths.frontier] {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Atomically claims a URL key
    ///
    /// Returns true if the caller now owns the URL, false if it was already
    /// claimed. Journal write failures are logged and otherwise ignored.
    pub fn claim(&self, key: &str) -> bool {
        let mut inner = self.lock();
        if !inner.claimed.insert(key.to_string()) {
            return false;
        }
        inner.pending.remove(key);

        if let Some(journal) = inner.journal.as_mut() {
            if let Err(e) = journal.file.write_all(format!("{}\n", key).as_bytes()) {
                warn!(
                    "Failed to append to {}: {}",
                    journal.paths.visited.display(),
                    e
                );
            }
        }

        inner.claims_since_checkpoint += 1;
        if inner.claims_since_checkpoint >= CHECKPOINT_INTERVAL {
            inner.claims_since_checkpoint = 0;
            write_frontier_logged(&inner);
        }

        true
    }

    pub fn is_claimed(&self, key: &str) -> bool {
        self.lock().claimed.contains(key)
    }

    /// Records a queued task that has not been claimed yet
    ///
    /// If the URL is already pending, the shallower depth wins.
    pub fn mark_pending(&self, key: &str, task: &CrawlTask) {
        let mut inner = self.lock();
        if inner.claimed.contains(key) {
            return;
        }
        inner
            .pending
            .entry(key.to_string())
            .and_modify(|existing| existing.depth = existing.depth.min(task.depth))
            .or_insert_with(|| task.clone());
    }

    /// Drops a pending task that was discarded without being claimed
    pub fn forget_pending(&self, key: &str) {
        self.lock().pending.remove(key);
    }

    /// Tasks queued but not yet claimed, shallowest first
    pub fn pending_tasks(&self) -> Vec<CrawlTask> {
        let inner = self.lock();
        let mut tasks: Vec<CrawlTask> = inner.pending.values().cloned().collect();
        tasks.sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.url.cmp(&b.url)));
        tasks
    }

    pub fn len(&self) -> usize {
        self.lock().claimed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_persistent(&self) -> bool {
        self.lock().journal.is_some()
    }

    /// All claimed keys, sorted
    pub fn claimed_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.lock().claimed.iter().cloned().collect();
        urls.sort();
        urls
    }

    /// Writes the frontier file now
    pub fn checkpoint(&self) {
        write_frontier_logged(&self.lock());
    }

    /// Persists the final state of a crawl
    ///
    /// The frontier file is removed when nothing is pending, so a finished
    /// crawl leaves only its claimed list behind.
    pub fn finish(&self) {
        let mut inner = self.lock();
        if inner.journal.is_none() {
            return;
        }

        if inner.pending.is_empty() {
            if let Some(journal) = inner.journal.as_ref() {
                match fs::remove_file(&journal.paths.frontier) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => warn!(
                        "Failed to remove {}: {}",
                        journal.paths.frontier.display(),
                        e
                    ),
                }
            }
        } else {
            write_frontier_logged(&inner);
        }

        if let Some(journal) = inner.journal.as_mut() {
            if let Err(e) = journal.file.sync_data() {
                warn!("Failed to sync {}: {}", journal.paths.visited.display(), e);
            }
        }
    }
}

fn read_claimed(path: &Path) -> io::Result<HashSet<String>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(e) => return Err(e),
    };

    let mut claimed = HashSet::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let url = line.trim();
        if !url.is_empty() {
            claimed.insert(url.to_string());
        }
    }
    Ok(claimed)
}

fn read_frontier(path: &Path) -> io::Result<Vec<CrawlTask>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut tasks = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let Some((depth, url)) = line.split_once('\t') else {
            continue;
        };
        match depth.trim().parse::<u32>() {
            Ok(depth) if !url.trim().is_empty() => tasks.push(CrawlTask::new(url.trim(), depth)),
            _ => debug!("Skipping malformed frontier line: {}", line),
        }
    }
    Ok(tasks)
}

fn write_frontier(journal: &Journal, pending: &HashMap<String, CrawlTask>) -> io::Result<()> {
    let tmp = journal.paths.frontier.with_extension("frontier.tmp");
    {
        let mut file = File::create(&tmp)?;
        let mut tasks: Vec<&CrawlTask> = pending.values().collect();
        tasks.sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.url.cmp(&b.url)));
        for task in tasks {
            writeln!(file, "{}\t{}", task.depth, task.url)?;
        }
        file.sync_data()?;
    }
    fs::rename(&tmp, &journal.paths.frontier)
}

fn write_frontier_logged(inner: &Inner) {
    if let Some(journal) = inner.journal.as_ref() {
        if let Err(e) = write_frontier(journal, &inner.pending) {
            warn!(
                "Failed to write {}: {}",
                journal.paths.frontier.display(),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_claim_once() {
        let visited = VisitedSet::in_memory();
        assert!(visited.claim("https://example.com/"));
        assert!(!visited.claim("https://example.com/"));
        assert_eq!(visited.len(), 1);
        assert!(!visited.is_persistent());
    }

    #[test]
    fn test_concurrent_claims_single_winner() {
        let visited = Arc::new(VisitedSet::in_memory());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let visited = Arc::clone(&visited);
                std::thread::spawn(move || visited.claim("https://example.com/race"))
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_state_file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let paths = StatePaths::for_domain(dir.path(), "example.com");

        {
            let (visited, frontier) = VisitedSet::open(paths.clone()).unwrap();
            assert!(frontier.is_empty());
            assert!(visited.claim("https://example.com/"));
            assert!(visited.claim("https://example.com/a"));
            visited.finish();
        }

        let content = fs::read_to_string(&paths.visited).unwrap();
        assert_eq!(content, "https://example.com/\nhttps://example.com/a\n");

        let (reopened, _) = VisitedSet::open(paths).unwrap();
        assert_eq!(
            reopened.claimed_urls(),
            vec![
                "https://example.com/".to_string(),
                "https://example.com/a".to_string()
            ]
        );
        assert!(!reopened.claim("https://example.com/a"));
    }

    #[test]
    fn test_frontier_saved_when_pending() {
        let dir = TempDir::new().unwrap();
        let paths = StatePaths::for_domain(dir.path(), "example.com");

        {
            let (visited, _) = VisitedSet::open(paths.clone()).unwrap();
            visited.claim("https://example.com/");
            let task = CrawlTask::new("https://example.com/next", 1);
            visited.mark_pending(&task.url, &task);
            visited.finish();
        }

        let frontier = fs::read_to_string(&paths.frontier).unwrap();
        assert_eq!(frontier, "1\thttps://example.com/next\n");

        let (_, tasks) = VisitedSet::open(paths).unwrap();
        assert_eq!(tasks, vec![CrawlTask::new("https://example.com/next", 1)]);
    }

    #[test]
    fn test_frontier_removed_when_drained() {
        let dir = TempDir::new().unwrap();
        let paths = StatePaths::for_domain(dir.path(), "example.com");

        let (visited, _) = VisitedSet::open(paths.clone()).unwrap();
        let task = CrawlTask::new("https://example.com/next", 1);
        visited.mark_pending(&task.url, &task);
        visited.checkpoint();
        assert!(paths.frontier.exists());

        visited.claim("https://example.com/next");
        visited.finish();
        assert!(!paths.frontier.exists());
    }

    #[test]
    fn test_crash_keeps_last_checkpoint_only() {
        let dir = TempDir::new().unwrap();
        let paths = StatePaths::for_domain(dir.path(), "example.com");

        {
            let (visited, _) = VisitedSet::open(paths.clone()).unwrap();
            let early = CrawlTask::new("https://example.com/early", 1);
            visited.mark_pending(&early.url, &early);

            for i in 0..CHECKPOINT_INTERVAL - 1 {
                visited.claim(&format!("https://example.com/p{}", i));
            }
            assert!(!paths.frontier.exists());

            visited.claim("https://example.com/last");
            assert!(paths.frontier.exists());

            let late = CrawlTask::new("https://example.com/late", 2);
            visited.mark_pending(&late.url, &late);
            // Dropped without finish(), as after a crash
        }

        let (reopened, tasks) = VisitedSet::open(paths).unwrap();
        assert_eq!(tasks, vec![CrawlTask::new("https://example.com/early", 1)]);
        assert_eq!(reopened.len(), CHECKPOINT_INTERVAL);
    }

    #[test]
    fn test_pending_keeps_shallowest_depth() {
        let visited = VisitedSet::in_memory();
        visited.mark_pending("k", &CrawlTask::new("https://example.com/k", 3));
        visited.mark_pending("k", &CrawlTask::new("https://example.com/k", 1));
        visited.mark_pending("k", &CrawlTask::new("https://example.com/k", 2));

        assert_eq!(
            visited.pending_tasks(),
            vec![CrawlTask::new("https://example.com/k", 1)]
        );
    }

    #[test]
    fn test_claimed_urls_are_not_pending() {
        let visited = VisitedSet::in_memory();
        visited.claim("k");
        visited.mark_pending("k", &CrawlTask::new("k", 1));
        assert!(visited.pending_tasks().is_empty());
    }

    #[test]
    fn test_frontier_skips_claimed_and_malformed_lines() {
        let dir = TempDir::new().unwrap();
        let paths = StatePaths::for_domain(dir.path(), "example.com");
        fs::write(&paths.visited, "https://example.com/done\n").unwrap();
        fs::write(
            &paths.frontier,
            "1\thttps://example.com/done\nnot-a-line\nx\thttps://example.com/bad\n2\thttps://example.com/todo\n",
        )
        .unwrap();

        let (_, tasks) = VisitedSet::open(paths).unwrap();
        assert_eq!(tasks, vec![CrawlTask::new("https://example.com/todo", 2)]);
    }

    #[test]
    fn test_discard_removes_files() {
        let dir = TempDir::new().unwrap();
        let paths = StatePaths::for_domain(dir.path(), "example.com");
        fs::write(&paths.visited, "https://example.com/\n").unwrap();

        VisitedSet::discard(&paths).unwrap();
        assert!(!paths.visited.exists());
        // Discarding twice is fine.
        VisitedSet::discard(&paths).unwrap();
    }

    #[test]
    fn test_state_paths_sanitize_domain() {
        let paths = StatePaths::for_domain(Path::new("/tmp/state"), "[::1]");
        assert_eq!(paths.visited, PathBuf::from("/tmp/state/___1_.state"));
        assert_eq!(paths.frontier, PathBuf::from("/tmp/state/___1_.frontier"));
    }
}
