//! Robots.txt handling module
//!
//! Fetches, parses and caches robots.txt per origin. Every failure to obtain
//! the file (network error, timeout, non-success status) is treated as
//! "everything allowed".

mod cache;
mod parser;

pub use cache::{CachedRobots, RobotsStore};
pub use parser::ParsedRobots;

use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const ROBOTS_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches robots.txt for an origin such as `https://example.com`
///
/// Never fails: anything other than a successful response yields
/// [`ParsedRobots::allow_all`].
pub async fn fetch_robots(client: &Client, origin: &str) -> ParsedRobots {
    let robots_url = format!("{}/robots.txt", origin.trim_end_matches('/'));

    let response = match client.get(&robots_url).timeout(ROBOTS_TIMEOUT).send().await {
        Ok(response) => response,
        Err(e) => {
            debug!("robots.txt unreachable at {}: {}", robots_url, e);
            return ParsedRobots::allow_all();
        }
    };

    if !response.status().is_success() {
        debug!(
            "robots.txt at {} returned {}, allowing all",
            robots_url,
            response.status()
        );
        return ParsedRobots::allow_all();
    }

    match response.text().await {
        Ok(body) => ParsedRobots::from_content(&body),
        Err(e) => {
            debug!("robots.txt body unreadable at {}: {}", robots_url, e);
            ParsedRobots::allow_all()
        }
    }
}

/// Checks URLs against robots.txt, fetching each origin's file once per day
pub struct RobotsCache {
    client: Client,
    user_agent: String,
    store: RobotsStore,
}

impl RobotsCache {
    pub fn new(client: Client, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            user_agent: user_agent.into(),
            store: RobotsStore::new(),
        }
    }

    /// Returns true if the URL may be crawled
    pub async fn is_allowed(&self, url: &Url) -> bool {
        let origin = url.origin().ascii_serialization();

        let rules = match self.store.get(&origin).await {
            Some(rules) => rules,
            None => {
                let rules = fetch_robots(&self.client, &origin).await;
                self.store.insert(&origin, rules.clone()).await;
                rules
            }
        };

        let allowed = rules.is_allowed(url.as_str(), &self.user_agent);
        if !allowed {
            info!("Blocked by robots.txt: {}", url);
        }
        allowed
    }
}
