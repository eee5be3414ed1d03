use crate::url::extract_domain;
use chrono::{DateTime, Utc};
use serde::Serialize;
use url::Url;

/// Structured data extracted from one fetched page
///
/// Created once per successfully fetched URL and handed to the record
/// consumer as soon as it exists.
#[derive(Debug, Clone, Serialize)]
pub struct PageRecord {
    /// URL the task was queued with
    pub url: String,

    /// URL after redirects
    pub final_url: String,

    /// Link distance from the seed
    pub depth: u32,

    pub title: String,

    /// Visible text, at most 500 characters plus `"..."`
    pub text_snippet: String,

    /// Every absolute HTTP(S) link on the page in first-seen order
    ///
    /// Scope rules apply only to which of these get crawled next.
    pub links: Vec<String>,

    /// Paths of media files saved for this page
    pub media_refs: Vec<String>,

    /// Markdown rendering of the page
    pub rendered_content: Option<String>,

    pub content_type: Option<String>,

    /// Full-page PNG, only from the render fetcher
    #[serde(skip)]
    pub screenshot: Option<Vec<u8>>,

    pub fetched_at: DateTime<Utc>,
}

impl PageRecord {
    /// Host of the queued URL, lower-cased, or an empty string
    pub fn domain(&self) -> String {
        Url::parse(&self.url)
            .ok()
            .and_then(|url| extract_domain(&url))
            .unwrap_or_default()
    }
}
