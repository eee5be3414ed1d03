//! Scheduler behavior with an in-process fetcher

use crate::common::{chain_site, html_page, options, policy, ScriptedFetcher};
use driftnet::crawler::{start_crawl_with_fetcher, JobStatus};
use driftnet::state::TaskOutcome;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const BASE: &str = "https://site.test";

#[tokio::test]
async fn test_densely_linked_pages_fetched_once() {
    let paths = ["/", "/a", "/b", "/c", "/d"];
    let links = [
        "/",
        "/a",
        "/b#section",
        "/c?utm_source=feed",
        "/d",
        "/a?fbclid=1",
    ];
    let pages = paths
        .iter()
        .map(|p| (format!("{}{}", BASE, p), html_page(p, &links)))
        .collect();
    let fetcher = Arc::new(ScriptedFetcher::new(pages));

    let handle = start_crawl_with_fetcher(
        &format!("{}/", BASE),
        policy(),
        10,
        4,
        fetcher.clone(),
        options(),
    )
    .await
    .unwrap();
    let (records, report) = handle.collect().await.unwrap();

    assert_eq!(records.len(), 5);
    assert_eq!(fetcher.total_calls(), 5);
    assert!(fetcher.calls().values().all(|&count| count == 1));
    assert_eq!(report.records_emitted, 5);
    assert_eq!(report.claimed, 5);
    assert_eq!(report.failures(), 0);
}

#[tokio::test]
async fn test_half_of_children_fail() {
    let children: Vec<String> = (0..10).map(|i| format!("/child{}", i)).collect();
    let child_refs: Vec<&str> = children.iter().map(String::as_str).collect();

    let mut pages = vec![(format!("{}/", BASE), html_page("Root", &child_refs))];
    // Odd children have no page and fail with 404
    for (i, child) in children.iter().enumerate() {
        if i % 2 == 0 {
            pages.push((format!("{}{}", BASE, child), html_page(child, &[])));
        }
    }
    let fetcher = Arc::new(ScriptedFetcher::new(pages));

    let handle = start_crawl_with_fetcher(
        &format!("{}/", BASE),
        policy(),
        1,
        3,
        fetcher.clone(),
        options(),
    )
    .await
    .unwrap();
    let (records, report) = handle.collect().await.unwrap();

    assert_eq!(records.len(), 6);
    assert_eq!(report.count(TaskOutcome::FetchFailed), 5);
    assert_eq!(report.processed(), 11);
    assert_eq!(fetcher.total_calls(), 11);
}

#[tokio::test]
async fn test_workers_respect_concurrency_limit() {
    let children: Vec<String> = (0..8).map(|i| format!("/c{}", i)).collect();
    let child_refs: Vec<&str> = children.iter().map(String::as_str).collect();

    let mut pages = vec![(format!("{}/", BASE), html_page("Root", &child_refs))];
    pages.extend(
        children
            .iter()
            .map(|c| (format!("{}{}", BASE, c), html_page(c, &[]))),
    );
    let fetcher =
        Arc::new(ScriptedFetcher::new(pages).with_delay(Duration::from_millis(20)));

    let handle = start_crawl_with_fetcher(
        &format!("{}/", BASE),
        policy(),
        1,
        2,
        fetcher.clone(),
        options(),
    )
    .await
    .unwrap();
    let (records, _) = handle.collect().await.unwrap();

    assert_eq!(records.len(), 9);
    assert!(fetcher.max_in_flight() <= 2);
    assert!(fetcher.max_in_flight() >= 1);
}

#[tokio::test]
async fn test_depth_limit_on_chain() {
    let fetcher = Arc::new(ScriptedFetcher::new(chain_site(BASE, 6)));

    let handle = start_crawl_with_fetcher(
        &format!("{}/", BASE),
        policy(),
        2,
        2,
        fetcher.clone(),
        options(),
    )
    .await
    .unwrap();
    let (records, _) = handle.collect().await.unwrap();

    let depths: HashSet<u32> = records.iter().map(|r| r.depth).collect();
    assert_eq!(records.len(), 3);
    assert_eq!(depths, HashSet::from([0, 1, 2]));
    assert_eq!(fetcher.total_calls(), 3);
}

#[tokio::test]
async fn test_cancel_stops_dispatch() {
    let fetcher = Arc::new(
        ScriptedFetcher::new(chain_site(BASE, 20)).with_delay(Duration::from_millis(30)),
    );

    let mut handle = start_crawl_with_fetcher(
        &format!("{}/", BASE),
        policy(),
        50,
        1,
        fetcher.clone(),
        options(),
    )
    .await
    .unwrap();
    let job = Arc::clone(handle.job());

    let first = handle.next_record().await.unwrap();
    assert_eq!(first.depth, 0);
    handle.cancel();

    let (rest, report) = handle.collect().await.unwrap();

    assert!(report.cancelled);
    assert!(rest.len() + 1 < 20);
    assert!(fetcher.total_calls() < 20);
    assert_eq!(job.status(), JobStatus::Cancelled);
}

#[tokio::test]
async fn test_join_without_consuming_records() {
    let fetcher = Arc::new(ScriptedFetcher::new(chain_site(BASE, 4)));

    let handle = start_crawl_with_fetcher(
        &format!("{}/", BASE),
        policy(),
        10,
        2,
        fetcher,
        options(),
    )
    .await
    .unwrap();
    let report = handle.join().await.unwrap();

    assert!(!report.cancelled);
    assert_eq!(report.processed(), 4);
}
