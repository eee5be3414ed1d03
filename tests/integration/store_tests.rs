//! Crawl records flowing into the SQLite store

use crate::common::{html_page, options, policy};
use driftnet::crawler::{start_crawl, CrawlReport, FetcherKind};
use driftnet::output::{
    export_pages, format_markdown_summary, generate_summary, RecordSink, SqliteSink,
};
use driftnet::storage::{RunStatus, SqliteStorage, Storage};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn crawl_into(db: &Path, seed: &str) -> (SqliteSink, CrawlReport, Vec<String>) {
    let storage = SqliteStorage::new(db).unwrap();
    let mut sink = SqliteSink::new(Box::new(storage), seed, "test-hash").unwrap();

    let mut handle = start_crawl(seed, policy(), 1, 2, FetcherKind::Http, options())
        .await
        .unwrap();

    let mut changes = Vec::new();
    while let Some(record) = handle.next_record().await {
        let change = sink.record(&record).unwrap();
        let status = if change.is_different {
            change.summary
        } else {
            "unchanged".to_string()
        };
        changes.push(format!("{} {}", record.url, status));
    }
    let report = handle.join().await.unwrap();
    sink.finalize(RunStatus::Completed).unwrap();
    changes.sort();

    (sink, report, changes)
}

#[tokio::test]
async fn test_second_crawl_detects_changes() {
    let db_dir = TempDir::new().unwrap();
    let db = db_dir.path().join("crawl.db");

    let server = MockServer::start().await;
    let base = server.uri();
    let seed = format!("{}/", base);

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html_page("Home", &["/news"])))
        .mount(&server)
        .await;
    let news = Mock::given(method("GET"))
        .and(path("/news"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(html_page("News", &[])),
        )
        .mount_as_scoped(&server)
        .await;

    let (sink, report, changes) = crawl_into(&db, &seed).await;
    assert_eq!(report.records_emitted, 2);
    assert_eq!(
        changes,
        vec![
            format!("{}/ New URL", base),
            format!("{}/news New URL", base)
        ]
    );
    assert_eq!(sink.storage().count_pages().unwrap(), 2);
    drop(sink);
    drop(news);

    Mock::given(method("GET"))
        .and(path("/news"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            html_page("News", &[]).replace("Content of News", "Content of News, now updated"),
        ))
        .mount(&server)
        .await;

    let (sink, _, changes) = crawl_into(&db, &seed).await;
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[0], format!("{}/ unchanged", base));
    assert!(changes[1].starts_with(&format!("{}/news Modified (+", base)));

    let storage = sink.storage();
    assert_eq!(storage.count_pages().unwrap(), 2);
    assert_eq!(storage.count_snapshots().unwrap(), 4);

    let history = storage.snapshots_for(&format!("{}/news", base)).unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].content_snippet.contains("now updated"));

    let summary = generate_summary(storage, None).unwrap();
    assert_eq!(summary.run_id, sink.run_id());
    assert_eq!(summary.status, "completed");
    assert_eq!(summary.pages_this_run, 2);
    assert_eq!(summary.changed_urls.len(), 2);
    assert!(format_markdown_summary(&summary).contains(&format!("- {}/news", base)));

    let export_path = db_dir.path().join("pages.json");
    assert_eq!(export_pages(storage, &export_path).unwrap(), 2);
}
