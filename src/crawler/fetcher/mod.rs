//! Page fetchers
//!
//! The crawl engine only needs `fetch(url) -> raw content`. Two strategies
//! implement it:
//! - [`HttpFetcher`]: a single GET with user-agent rotation and retries
//! - [`RenderFetcher`]: a headless Chromium page per task
//!
//! The strategy is chosen once per crawl through [`FetcherKind`].

mod http;
mod render;

pub use http::{HttpFetcher, RetryPolicy};
pub use render::RenderFetcher;

use crate::config::{FetchConfig, RenderConfig};
use crate::DriftnetError;
use async_trait::async_trait;
use reqwest::{Client, Proxy};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// What a fetcher hands back for one URL
#[derive(Debug, Clone, Default)]
pub struct FetchedPage {
    /// URL after redirects
    pub final_url: String,

    pub raw_content: String,

    pub content_type: Option<String>,

    /// Full-page PNG, render fetcher only
    pub screenshot: Option<Vec<u8>>,

    /// Image and PDF URLs the browser saw, render fetcher only
    pub resource_urls: Vec<String>,
}

/// Fetch failures
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Browser error: {0}")]
    Browser(String),
}

impl FetchError {
    /// Returns true if retrying the same request may succeed
    ///
    /// | Failure | Transient |
    /// |---------|-----------|
    /// | connect / timeout / request send | yes |
    /// | HTTP 5xx, HTTP 429 | yes |
    /// | other HTTP status | no |
    /// | unsupported scheme, browser error | no |
    pub fn is_transient(&self) -> bool {
        match self {
            Self::UnsupportedScheme(_) | Self::Browser(_) => false,
            Self::Status { status, .. } => *status == 429 || (500..600).contains(status),
            Self::Request(e) => e.is_connect() || e.is_timeout() || e.is_request() || e.is_body(),
            Self::Timeout(_) => true,
        }
    }
}

/// The narrow capability the crawl engine needs from a fetch strategy
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError>;

    /// Releases resources held by the fetcher
    async fn shutdown(&self) {}
}

/// Fetch strategy for a whole crawl
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetcherKind {
    #[default]
    Http,
    Render,
}

impl FetcherKind {
    /// Builds the fetcher
    ///
    /// The render variant launches its browser here, so a missing or broken
    /// Chromium fails the crawl before any task runs.
    pub async fn build(
        self,
        fetch: &FetchConfig,
        render: &RenderConfig,
    ) -> Result<Arc<dyn PageFetcher>, DriftnetError> {
        match self {
            Self::Http => Ok(Arc::new(HttpFetcher::new(fetch)?)),
            Self::Render => {
                let fetcher = RenderFetcher::launch(fetch, render)
                    .await
                    .map_err(|e| DriftnetError::FetcherSetup(e.to_string()))?;
                Ok(Arc::new(fetcher))
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Render => "render",
        }
    }
}

impl std::str::FromStr for FetcherKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "render" => Ok(Self::Render),
            other => Err(format!("unknown fetcher '{}', expected http or render", other)),
        }
    }
}

/// Builds the shared HTTP client
///
/// Used by the HTTP fetcher, robots.txt checks, sitemap expansion and media
/// downloads. Redirects are followed (reqwest default of 10 hops).
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    let user_agent = format!("{}/{}", config.robots_agent, env!("CARGO_PKG_VERSION"));

    let mut builder = Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = &config.proxy {
        builder = builder.proxy(Proxy::all(proxy)?);
    }

    builder.build()
}
