use std::fmt;

/// How a dequeued crawl task ended
///
/// Every task pulled from the work queue finishes in exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskOutcome {
    // ===== Success =====
    /// Page was fetched, extracted and its record emitted
    Emitted,

    // ===== Skips =====
    /// Task depth exceeded the crawl's maximum depth
    DepthExceeded,

    /// URL had already been claimed by another task or a previous run
    AlreadyClaimed,

    /// robots.txt disallows the URL
    RobotsBlocked,

    /// URL lacks the keyword filter and is not the seed
    KeywordFiltered,

    // ===== Failures =====
    /// URL could not be parsed as an absolute HTTP(S) URL
    Malformed,

    /// Fetch failed after retries, or failed permanently
    FetchFailed,
}

impl TaskOutcome {
    /// Returns true if the task produced a page record
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Emitted)
    }

    /// Returns true if the task was discarded before fetching by policy
    pub fn is_skipped(&self) -> bool {
        matches!(
            self,
            Self::DepthExceeded | Self::AlreadyClaimed | Self::RobotsBlocked | Self::KeywordFiltered
        )
    }

    /// Returns true if the task failed
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Malformed | Self::FetchFailed)
    }

    /// Stable string form used in logs, summaries and exports
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Emitted => "emitted",
            Self::DepthExceeded => "depth_exceeded",
            Self::AlreadyClaimed => "already_claimed",
            Self::RobotsBlocked => "robots_blocked",
            Self::KeywordFiltered => "keyword_filtered",
            Self::Malformed => "malformed",
            Self::FetchFailed => "fetch_failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "emitted" => Some(Self::Emitted),
            "depth_exceeded" => Some(Self::DepthExceeded),
            "already_claimed" => Some(Self::AlreadyClaimed),
            "robots_blocked" => Some(Self::RobotsBlocked),
            "keyword_filtered" => Some(Self::KeywordFiltered),
            "malformed" => Some(Self::Malformed),
            "fetch_failed" => Some(Self::FetchFailed),
            _ => None,
        }
    }

    pub fn all() -> [Self; 7] {
        [
            Self::Emitted,
            Self::DepthExceeded,
            Self::AlreadyClaimed,
            Self::RobotsBlocked,
            Self::KeywordFiltered,
            Self::Malformed,
            Self::FetchFailed,
        ]
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
