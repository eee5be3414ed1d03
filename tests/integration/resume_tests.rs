//! Persisted visited state across crawls

use crate::common::{chain_site, options_with_state, policy, ScriptedFetcher};
use driftnet::crawler::start_crawl_with_fetcher;
use driftnet::state::{StatePaths, TaskOutcome};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const BASE: &str = "https://resume.test";

#[tokio::test]
async fn test_finished_crawl_is_not_repeated() {
    let state = TempDir::new().unwrap();

    let first = Arc::new(ScriptedFetcher::new(chain_site(BASE, 4)));
    let handle = start_crawl_with_fetcher(
        &format!("{}/", BASE),
        policy(),
        10,
        2,
        first.clone(),
        options_with_state(state.path().to_path_buf(), false),
    )
    .await
    .unwrap();
    let (records, _) = handle.collect().await.unwrap();
    assert_eq!(records.len(), 4);

    let paths = StatePaths::for_domain(state.path(), "resume.test");
    assert!(paths.visited.exists());
    assert!(!paths.frontier.exists());

    let second = Arc::new(ScriptedFetcher::new(chain_site(BASE, 4)));
    let handle = start_crawl_with_fetcher(
        &format!("{}/", BASE),
        policy(),
        10,
        2,
        second.clone(),
        options_with_state(state.path().to_path_buf(), false),
    )
    .await
    .unwrap();
    let (records, report) = handle.collect().await.unwrap();

    assert!(records.is_empty());
    assert_eq!(second.total_calls(), 0);
    assert_eq!(report.claimed, 4);
}

#[tokio::test]
async fn test_fresh_discards_state() {
    let state = TempDir::new().unwrap();

    for fresh in [false, true] {
        let fetcher = Arc::new(ScriptedFetcher::new(chain_site(BASE, 3)));
        let handle = start_crawl_with_fetcher(
            &format!("{}/", BASE),
            policy(),
            10,
            1,
            fetcher.clone(),
            options_with_state(state.path().to_path_buf(), fresh),
        )
        .await
        .unwrap();
        let (records, _) = handle.collect().await.unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(fetcher.total_calls(), 3);
    }
}

#[tokio::test]
async fn test_cancelled_crawl_resumes_from_frontier() {
    let state = TempDir::new().unwrap();
    let length = 12;

    let first = Arc::new(
        ScriptedFetcher::new(chain_site(BASE, length)).with_delay(Duration::from_millis(30)),
    );
    let mut handle = start_crawl_with_fetcher(
        &format!("{}/", BASE),
        policy(),
        50,
        1,
        first.clone(),
        options_with_state(state.path().to_path_buf(), false),
    )
    .await
    .unwrap();

    let mut seen: Vec<String> = Vec::new();
    seen.push(handle.next_record().await.unwrap().url);
    handle.cancel();
    let (rest, report) = handle.collect().await.unwrap();
    seen.extend(rest.into_iter().map(|r| r.url));

    assert!(report.cancelled);
    assert!(seen.len() < length);
    assert_eq!(report.frontier_remaining, 1);

    let paths = StatePaths::for_domain(state.path(), "resume.test");
    assert!(paths.frontier.exists());

    let second = Arc::new(ScriptedFetcher::new(chain_site(BASE, length)));
    let handle = start_crawl_with_fetcher(
        &format!("{}/", BASE),
        policy(),
        50,
        2,
        second.clone(),
        options_with_state(state.path().to_path_buf(), false),
    )
    .await
    .unwrap();
    let (records, report) = handle.collect().await.unwrap();
    assert!(!report.cancelled);
    assert_eq!(report.count(TaskOutcome::FetchFailed), 0);
    seen.extend(records.into_iter().map(|r| r.url));

    let unique: HashSet<&String> = seen.iter().collect();
    assert_eq!(seen.len(), length, "no page is emitted twice across runs");
    assert_eq!(unique.len(), length);
    assert!(first.calls().values().all(|&count| count == 1));
    assert!(second.calls().values().all(|&count| count == 1));
    assert!(first
        .calls()
        .keys()
        .all(|key| !second.calls().contains_key(key)));
}
