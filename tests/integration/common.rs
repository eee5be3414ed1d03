#![allow(dead_code)]

use async_trait::async_trait;
use driftnet::config::FetchConfig;
use driftnet::crawler::{CrawlOptions, FetchError, FetchedPage, PageFetcher};
use driftnet::policy::ScopePolicy;
use driftnet::url::claim_key;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Crawl options with fast retries and no persisted state
pub fn options() -> CrawlOptions {
    CrawlOptions {
        fetch: FetchConfig {
            max_attempts: 2,
            backoff_base_ms: 5,
            backoff_cap_ms: 10,
            timeout_secs: 5,
            ..FetchConfig::default()
        },
        ..CrawlOptions::default()
    }
}

pub fn options_with_state(state_dir: PathBuf, fresh: bool) -> CrawlOptions {
    CrawlOptions {
        state_dir: Some(state_dir),
        fresh,
        ..options()
    }
}

/// Same-domain policy that skips robots.txt
pub fn policy() -> ScopePolicy {
    ScopePolicy::new(true, None, None, false).unwrap()
}

/// Builds a small HTML page linking to `links`
pub fn html_page(title: &str, links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|link| format!("<a href=\"{}\">{}</a>\n", link, link))
        .collect();
    format!(
        "<html><head><title>{}</title></head><body><h1>{}</h1><p>Content of {}</p>{}</body></html>",
        title, title, title, anchors
    )
}

pub async fn mount_page(server: &MockServer, route: &str, title: &str, links: &[&str]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(html_page(title, links), "text/html"),
        )
        .mount(server)
        .await;
}

/// In-process fetcher serving a fixed set of pages
///
/// Pages are keyed by claim key; anything unknown is a 404. Every call is
/// counted, and the highest number of concurrent fetches is tracked.
pub struct ScriptedFetcher {
    pages: HashMap<String, String>,
    delay: Duration,
    calls: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new(pages: Vec<(String, String)>) -> Self {
        Self {
            pages: pages
                .into_iter()
                .map(|(url, body)| (claim_key(&url), body))
                .collect(),
            delay: Duration::ZERO,
            calls: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fetch count per claim key
    pub fn calls(&self) -> HashMap<String, usize> {
        self.calls.lock().unwrap().clone()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let key = claim_key(url.as_str());
        *self.calls.lock().unwrap().entry(key.clone()).or_insert(0) += 1;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.pages.get(&key) {
            Some(body) => Ok(FetchedPage {
                final_url: url.to_string(),
                raw_content: body.clone(),
                content_type: Some("text/html".to_string()),
                ..FetchedPage::default()
            }),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

/// A chain of pages where page `i` links only to page `i + 1`
pub fn chain_site(base: &str, length: usize) -> Vec<(String, String)> {
    (0..length)
        .map(|i| {
            let url = if i == 0 {
                format!("{}/", base)
            } else {
                format!("{}/p{}", base, i)
            };
            let next = format!("/p{}", i + 1);
            let links: Vec<&str> = if i + 1 < length {
                vec![next.as_str()]
            } else {
                Vec::new()
            };
            (url, html_page(&format!("Page {}", i), &links))
        })
        .collect()
}
