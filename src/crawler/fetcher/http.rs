//! Lightweight HTTP fetcher

use super::{build_http_client, FetchError, FetchedPage, PageFetcher};
use crate::config::FetchConfig;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Browser user agents used when the config lists none
const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:125.0) Gecko/20100101 Firefox/125.0",
];

/// Configured user agents, or the built-in pool when none are set
pub(super) fn user_agent_pool(config: &FetchConfig) -> Vec<String> {
    if config.user_agents.is_empty() {
        DEFAULT_USER_AGENTS.iter().map(|ua| ua.to_string()).collect()
    } else {
        config.user_agents.clone()
    }
}

pub(super) fn pick_user_agent(pool: &[String]) -> String {
    pool.choose(&mut rand::thread_rng())
        .cloned()
        .unwrap_or_default()
}

/// Exponential backoff for transient fetch failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub cap: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base: Duration::from_millis(config.backoff_base_ms),
            cap: Duration::from_millis(config.backoff_cap_ms),
        }
    }

    /// Delay before the retry that follows failed attempt `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

/// Single GET per attempt with a randomly chosen user agent
pub struct HttpFetcher {
    client: Client,
    user_agents: Vec<String>,
    retry: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(build_http_client(config)?, config))
    }

    pub fn with_client(client: Client, config: &FetchConfig) -> Self {
        Self {
            client,
            user_agents: user_agent_pool(config),
            retry: RetryPolicy::from_config(config),
        }
    }

    fn pick_user_agent(&self) -> String {
        pick_user_agent(&self.user_agents)
    }

    async fn fetch_once(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let response = self
            .client
            .get(url.as_str())
            .header(USER_AGENT, self.pick_user_agent())
            .send()
            .await?;

        let status = response.status();
        let final_url = response.url().to_string();

        if !status.is_success() {
            return Err(FetchError::Status {
                url: final_url,
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let raw_content = response.text().await?;

        Ok(FetchedPage {
            final_url,
            raw_content,
            content_type,
            ..FetchedPage::default()
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(FetchError::UnsupportedScheme(url.scheme().to_string()));
        }

        let mut attempt = 1;
        loop {
            match self.fetch_once(url).await {
                Ok(page) => {
                    debug!("Fetched {} on attempt {}", url, attempt);
                    return Ok(page);
                }
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        "Attempt {}/{} for {} failed: {}; retrying in {:?}",
                        attempt, self.retry.max_attempts, url, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
