//! Per-origin robots.txt cache with 24 hour expiry

use crate::robots::ParsedRobots;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Robots.txt rules together with the time they were fetched
#[derive(Debug, Clone)]
pub struct CachedRobots {
    pub rules: ParsedRobots,
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    pub fn new(rules: ParsedRobots) -> Self {
        Self {
            rules,
            fetched_at: Utc::now(),
        }
    }

    /// Returns true once the entry is older than 24 hours
    pub fn is_stale(&self) -> bool {
        Utc::now() - self.fetched_at > Duration::hours(24)
    }
}

/// Robots.txt entries keyed by origin (`scheme://host:port`)
#[derive(Debug, Default)]
pub struct RobotsStore {
    entries: Mutex<HashMap<String, CachedRobots>>,
}

impl RobotsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns fresh rules for an origin, if cached
    pub async fn get(&self, origin: &str) -> Option<ParsedRobots> {
        let entries = self.entries.lock().await;
        entries
            .get(origin)
            .filter(|cached| !cached.is_stale())
            .map(|cached| cached.rules.clone())
    }

    /// Stores rules for an origin, replacing any previous entry
    pub async fn insert(&self, origin: &str, rules: ParsedRobots) {
        let mut entries = self.entries.lock().await;
        entries.insert(origin.to_string(), CachedRobots::new(rules));
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
