//! Scope policy: decides which URLs a crawl may visit
//!
//! The policy is fixed for the lifetime of one crawl. Domain and pattern checks
//! are pure; robots.txt compliance needs the network and lives in
//! [`crate::robots`].

use crate::config::PolicyConfig;
use crate::url::same_host;
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Eligibility rules applied to candidate URLs
#[derive(Debug, Clone)]
pub struct ScopePolicy {
    /// Only follow links whose host equals the seed host
    pub same_domain_only: bool,
    /// Links must match this pattern somewhere to be followed
    pub link_regex: Option<Regex>,
    /// URLs must contain this substring to be fetched; the seed is exempt
    pub keyword_filter: Option<String>,
    /// Honor robots.txt disallow rules
    pub respect_robots: bool,
}

impl Default for ScopePolicy {
    fn default() -> Self {
        Self {
            same_domain_only: true,
            link_regex: None,
            keyword_filter: None,
            respect_robots: true,
        }
    }
}

impl ScopePolicy {
    /// Builds a policy, compiling the link pattern
    ///
    /// An invalid pattern is a configuration error: a crawl cannot start with it.
    pub fn new(
        same_domain_only: bool,
        link_regex: Option<&str>,
        keyword_filter: Option<&str>,
        respect_robots: bool,
    ) -> Result<Self, ConfigError> {
        let link_regex = link_regex
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| {
                    ConfigError::InvalidPattern(format!("'{}' does not compile: {}", pattern, e))
                })
            })
            .transpose()?;

        Ok(Self {
            same_domain_only,
            link_regex,
            keyword_filter: keyword_filter
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string),
            respect_robots,
        })
    }

    /// Builds a policy from its configuration section
    pub fn from_config(config: &PolicyConfig) -> Result<Self, ConfigError> {
        Self::new(
            config.same_domain_only,
            config.link_regex.as_deref(),
            config.keyword_filter.as_deref(),
            config.respect_robots,
        )
    }

    /// Returns true if the URL passes the keyword filter
    ///
    /// A plain, case-sensitive substring test. The seed always passes so a
    /// crawl can begin from a page whose own URL lacks the keyword.
    pub fn passes_keyword(&self, url: &str, is_seed: bool) -> bool {
        match &self.keyword_filter {
            Some(keyword) if !is_seed => url.contains(keyword.as_str()),
            _ => true,
        }
    }
}

/// Decides whether a discovered link may be followed
///
/// `same_domain_only` requires the link host to equal `seed_domain`, and a
/// `link_regex` must match anywhere in the URL. Both conditions apply together.
pub fn is_in_scope(url: &Url, policy: &ScopePolicy, seed_domain: &str) -> bool {
    if policy.same_domain_only && !same_host(url, seed_domain) {
        return false;
    }

    match &policy.link_regex {
        Some(pattern) => pattern.is_match(url.as_str()),
        None => true,
    }
}
