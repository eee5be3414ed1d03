use crate::crawler::FetcherKind;
use serde::Deserialize;

/// Main configuration structure for Driftnet
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Crawl traversal configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Seed URL; a URL whose path ends in `.xml` is treated as a sitemap
    pub seed: String,

    /// Maximum link depth from the seed (the seed itself is depth 0)
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Number of concurrent crawl workers
    #[serde(rename = "max-concurrency")]
    pub max_concurrency: usize,

    /// Fetch strategy used for every page of the crawl
    #[serde(default)]
    pub fetcher: FetcherKind,
}

/// Scope policy configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Only follow links whose host equals the seed host
    #[serde(rename = "same-domain-only")]
    pub same_domain_only: bool,

    /// Regular expression a discovered link must match to be followed
    #[serde(rename = "link-regex")]
    pub link_regex: Option<String>,

    /// Substring a URL must contain to be fetched (the seed is exempt)
    #[serde(rename = "keyword-filter")]
    pub keyword_filter: Option<String>,

    /// Honor robots.txt disallow rules
    #[serde(rename = "respect-robots")]
    pub respect_robots: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            same_domain_only: true,
            link_regex: None,
            keyword_filter: None,
            respect_robots: true,
        }
    }
}

/// Network fetch configuration shared by both fetch strategies
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Per-request timeout for the HTTP fetcher (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Navigation timeout for the browser fetcher (seconds)
    #[serde(rename = "render-timeout-secs")]
    pub render_timeout_secs: u64,

    /// Total attempts for a transient failure, including the first
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (milliseconds)
    #[serde(rename = "backoff-base-ms")]
    pub backoff_base_ms: u64,

    /// Upper bound on any single retry delay (milliseconds)
    #[serde(rename = "backoff-cap-ms")]
    pub backoff_cap_ms: u64,

    /// Optional proxy URL applied to all outbound requests
    pub proxy: Option<String>,

    /// User agents to rotate through; a built-in pool is used when empty
    #[serde(rename = "user-agents")]
    pub user_agents: Vec<String>,

    /// Agent name matched against robots.txt groups
    #[serde(rename = "robots-agent")]
    pub robots_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            render_timeout_secs: 45,
            max_attempts: 3,
            backoff_base_ms: 2_000,
            backoff_cap_ms: 10_000,
            proxy: None,
            user_agents: Vec::new(),
            robots_agent: "Driftnet".to_string(),
        }
    }
}

/// Headless browser configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub headless: bool,

    /// Install anti-fingerprinting overrides before page scripts run
    pub stealth: bool,

    /// Capture a full-page PNG screenshot of every page
    pub screenshot: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            headless: true,
            stealth: false,
            screenshot: false,
        }
    }
}

/// Media download configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub enabled: bool,

    /// Directory downloaded images and PDFs are written to
    pub directory: String,

    /// Per-file download timeout (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: "output/media".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory holding per-domain visited state; persistence is off when unset
    #[serde(rename = "state-dir")]
    pub state_dir: Option<String>,

    /// Path to the markdown summary file
    #[serde(rename = "summary-path")]
    pub summary_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "driftnet.db".to_string(),
            state_dir: Some("state".to_string()),
            summary_path: "summary.md".to_string(),
        }
    }
}
