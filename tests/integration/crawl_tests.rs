//! End-to-end crawls over HTTP against wiremock servers

use crate::common::{mount_page, options, policy};
use driftnet::config::MediaConfig;
use driftnet::crawler::{start_crawl, CrawlOptions, FetcherKind, JobRegistry, JobStatus};
use driftnet::policy::ScopePolicy;
use driftnet::state::TaskOutcome;
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_crawl_site_with_failing_child() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", "Home", &["/a", "/b", "/broken"]).await;
    mount_page(&server, "/a", "A", &["/", "/b"]).await;
    mount_page(&server, "/b", "B", &[]).await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let handle = start_crawl(
        &format!("{}/", base),
        policy(),
        2,
        3,
        FetcherKind::Http,
        options(),
    )
    .await
    .unwrap();
    let job = Arc::clone(handle.job());

    let (records, report) = handle.collect().await.unwrap();

    let urls: HashSet<String> = records.iter().map(|r| r.url.clone()).collect();
    assert_eq!(records.len(), 3, "each page is emitted exactly once");
    assert!(urls.contains(&format!("{}/", base)));
    assert!(urls.contains(&format!("{}/a", base)));
    assert!(urls.contains(&format!("{}/b", base)));

    let home = records.iter().find(|r| r.depth == 0).unwrap();
    assert_eq!(home.title, "Home");
    assert_eq!(home.links.len(), 3);
    assert_eq!(home.content_type.as_deref(), Some("text/html"));

    let a = records
        .iter()
        .find(|r| r.url == format!("{}/a", base))
        .unwrap();
    assert_eq!(a.depth, 1);

    assert_eq!(report.records_emitted, 3);
    assert_eq!(report.count(TaskOutcome::FetchFailed), 1);
    assert_eq!(report.failures(), 1);
    assert!(!report.cancelled);
    assert_eq!(job.status(), JobStatus::Completed);
}

#[tokio::test]
async fn test_depth_zero_emits_only_seed() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "Home", &["/a"]).await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let handle = start_crawl(
        &format!("{}/", server.uri()),
        policy(),
        0,
        2,
        FetcherKind::Http,
        options(),
    )
    .await
    .unwrap();
    let (records, report) = handle.collect().await.unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].depth, 0);
    assert_eq!(report.processed(), 1);
}

#[tokio::test]
async fn test_foreign_links_recorded_but_not_crawled() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "Home", &["/a", "http://other.invalid/x"]).await;
    mount_page(&server, "/a", "A", &[]).await;

    let handle = start_crawl(
        &format!("{}/", server.uri()),
        policy(),
        3,
        2,
        FetcherKind::Http,
        options(),
    )
    .await
    .unwrap();
    let (records, report) = handle.collect().await.unwrap();

    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| !r.url.contains("other.invalid")));

    let home = records.iter().find(|r| r.depth == 0).unwrap();
    assert_eq!(
        home.links,
        vec![
            format!("{}/a", server.uri()),
            "http://other.invalid/x".to_string()
        ]
    );
    assert_eq!(report.failures(), 0);
}

#[tokio::test]
async fn test_link_pattern_limits_traversal() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "Home", &["/docs/a", "/blog/b"]).await;
    mount_page(&server, "/docs/a", "Doc", &[]).await;
    Mock::given(method("GET"))
        .and(path("/blog/b"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let policy = ScopePolicy::new(true, Some("/docs/"), None, false).unwrap();
    let handle = start_crawl(
        &format!("{}/", server.uri()),
        policy,
        2,
        2,
        FetcherKind::Http,
        options(),
    )
    .await
    .unwrap();
    let (records, _) = handle.collect().await.unwrap();

    let urls: HashSet<String> = records.iter().map(|r| r.url.clone()).collect();
    assert_eq!(urls.len(), 2);
    assert!(urls.contains(&format!("{}/docs/a", server.uri())));
}

#[tokio::test]
async fn test_robots_disallow_is_honored() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private"),
        )
        .mount(&server)
        .await;
    mount_page(&server, "/", "Home", &["/private/x", "/a"]).await;
    mount_page(&server, "/a", "A", &[]).await;
    Mock::given(method("GET"))
        .and(path("/private/x"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let policy = ScopePolicy::new(true, None, None, true).unwrap();
    let handle = start_crawl(
        &format!("{}/", server.uri()),
        policy,
        2,
        2,
        FetcherKind::Http,
        options(),
    )
    .await
    .unwrap();
    let (records, report) = handle.collect().await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(report.count(TaskOutcome::RobotsBlocked), 1);
}

#[tokio::test]
async fn test_sitemap_seed_expands_to_pages() {
    let server = MockServer::start().await;
    let base = server.uri();
    let sitemap = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>{base}/p1</loc></url>
  <url><loc>{base}/p2</loc></url>
</urlset>"#
    );
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sitemap))
        .mount(&server)
        .await;
    mount_page(&server, "/p1", "One", &["/p3"]).await;
    mount_page(&server, "/p2", "Two", &[]).await;

    let handle = start_crawl(
        &format!("{}/sitemap.xml", base),
        policy(),
        0,
        2,
        FetcherKind::Http,
        options(),
    )
    .await
    .unwrap();
    let (records, _) = handle.collect().await.unwrap();

    let mut titles: Vec<String> = records.iter().map(|r| r.title.clone()).collect();
    titles.sort();
    assert_eq!(titles, vec!["One".to_string(), "Two".to_string()]);
    assert!(records.iter().all(|r| r.depth == 0));
}

#[tokio::test]
async fn test_keyword_filter_exempts_seed() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "Home", &["/docs/intro", "/blog/post"]).await;
    mount_page(&server, "/docs/intro", "Intro", &[]).await;
    Mock::given(method("GET"))
        .and(path("/blog/post"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let policy = ScopePolicy::new(true, None, Some("docs"), false).unwrap();
    let handle = start_crawl(
        &format!("{}/", server.uri()),
        policy,
        2,
        2,
        FetcherKind::Http,
        options(),
    )
    .await
    .unwrap();
    let (records, report) = handle.collect().await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(report.count(TaskOutcome::KeywordFiltered), 1);
}

#[tokio::test]
async fn test_media_is_downloaded() {
    let server = MockServer::start().await;
    let media_dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><head><title>Gallery</title></head>
               <body><img src="/img/logo.png"><p>Pictures</p></body></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/logo.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(vec![0x89, b'P', b'N', b'G']),
        )
        .expect(1)
        .mount(&server)
        .await;

    let options = CrawlOptions {
        media: MediaConfig {
            enabled: true,
            directory: media_dir.path().to_string_lossy().into_owned(),
            timeout_secs: 5,
        },
        ..options()
    };
    let handle = start_crawl(
        &format!("{}/", server.uri()),
        policy(),
        0,
        1,
        FetcherKind::Http,
        options,
    )
    .await
    .unwrap();
    let (records, _) = handle.collect().await.unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].media_refs.len(), 1);
    let saved = media_dir.path().join("logo.png");
    assert_eq!(records[0].media_refs[0], saved.to_string_lossy());
    assert_eq!(std::fs::read(saved).unwrap(), vec![0x89, b'P', b'N', b'G']);
}

#[tokio::test]
async fn test_registry_tracks_submitted_job() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "Home", &["/a"]).await;
    mount_page(&server, "/a", "A", &[]).await;

    let registry = JobRegistry::new();
    let handle = registry
        .submit(
            &format!("{}/", server.uri()),
            policy(),
            1,
            2,
            FetcherKind::Http,
            options(),
        )
        .await
        .unwrap();
    let id = handle.job().id();
    assert_eq!(registry.len(), 1);

    let (records, _) = handle.collect().await.unwrap();
    assert_eq!(records.len(), 2);

    let job = registry.get(id).unwrap();
    assert_eq!(job.status(), JobStatus::Completed);
    let snapshot = job.snapshot();
    assert_eq!(snapshot.emitted, 2);
    assert_eq!(snapshot.failed, 0);

    assert_eq!(registry.purge_finished(), 1);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_invalid_inputs_are_rejected() {
    let bad_seed = start_crawl("not a url", policy(), 1, 1, FetcherKind::Http, options()).await;
    assert!(bad_seed.is_err());

    let ftp_seed = start_crawl(
        "ftp://example.com/",
        policy(),
        1,
        1,
        FetcherKind::Http,
        options(),
    )
    .await;
    assert!(ftp_seed.is_err());

    let no_workers = start_crawl(
        "https://example.com/",
        policy(),
        1,
        0,
        FetcherKind::Http,
        options(),
    )
    .await;
    assert!(no_workers.is_err());
}
