//! HTML extraction
//!
//! Turns raw HTML into the data a page record carries:
//! - title (`"No Title"` when missing)
//! - visible text snippet, at most 500 characters plus `"..."`
//! - absolute HTTP(S) links, deduplicated, first-seen order
//! - media candidates (image sources and PDF links)
//! - a markdown rendering
//!
//! Extraction never fails; malformed HTML degrades to empty fields.

use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Maximum snippet length in characters, before the ellipsis
pub const SNIPPET_CHARS: usize = 500;

pub const DEFAULT_TITLE: &str = "No Title";

/// Elements whose text is never visible
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Data extracted from one page
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPage {
    pub title: String,
    pub text_snippet: String,
    pub links: Vec<String>,
    /// Absolute image and PDF URLs, not yet downloaded
    pub media_candidates: Vec<String>,
    pub rendered_content: Option<String>,
}

/// Extracts page data, resolving relative URLs against `base_url`
///
/// # Example
///
/// ```
/// use driftnet::crawler::extract;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let page = extract(html, &base_url);
/// assert_eq!(page.title, "Test");
/// assert_eq!(page.links, vec!["https://example.com/page".to_string()]);
/// ```
pub fn extract(html: &str, base_url: &Url) -> ExtractedPage {
    let document = Html::parse_document(html);

    ExtractedPage {
        title: extract_title(&document).unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        text_snippet: snippet(&visible_text(&document)),
        links: extract_links(&document, base_url),
        media_candidates: extract_media(&document, base_url),
        rendered_content: htmd::convert(html)
            .ok()
            .filter(|markdown| !markdown.trim().is_empty()),
    }
}

fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Body text with hidden elements skipped and whitespace collapsed
fn visible_text(document: &Html) -> String {
    let root = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element());

    let mut words: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let text = match node.value().as_text() {
            Some(text) => text,
            None => continue,
        };

        let hidden = node.ancestors().any(|ancestor| {
            ElementRef::wrap(ancestor)
                .map(|element| HIDDEN_ELEMENTS.contains(&element.value().name()))
                .unwrap_or(false)
        });
        if hidden {
            continue;
        }

        words.extend(text.split_whitespace());
    }

    words.join(" ")
}

/// Truncates to [`SNIPPET_CHARS`] characters, appending `"..."` if cut
pub fn snippet(text: &str) -> String {
    if text.chars().count() > SNIPPET_CHARS {
        let mut cut: String = text.chars().take(SNIPPET_CHARS).collect();
        cut.push_str("...");
        cut
    } else {
        text.to_string()
    }
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if let Some(absolute_url) = element
                .value()
                .attr("href")
                .and_then(|href| resolve_link(href, base_url))
            {
                if seen.insert(absolute_url.clone()) {
                    links.push(absolute_url);
                }
            }
        }
    }

    links
}

fn extract_media(document: &Html, base_url: &Url) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut media = Vec::new();

    if let Ok(img_selector) = Selector::parse("img[src]") {
        for element in document.select(&img_selector) {
            if let Some(src) = element
                .value()
                .attr("src")
                .and_then(|src| resolve_link(src, base_url))
            {
                if seen.insert(src.clone()) {
                    media.push(src);
                }
            }
        }
    }

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if let Some(href) = element
                .value()
                .attr("href")
                .and_then(|href| resolve_link(href, base_url))
            {
                if is_pdf(&href) && seen.insert(href.clone()) {
                    media.push(href);
                }
            }
        }
    }

    media
}

fn is_pdf(url: &str) -> bool {
    Url::parse(url)
        .map(|u| u.path().to_ascii_lowercase().ends_with(".pdf"))
        .unwrap_or(false)
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only links
/// - Non-HTTP(S) URLs after resolution
///
/// The fragment of an accepted URL is removed.
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    let mut absolute_url = base_url.join(href).ok()?;
    if absolute_url.scheme() != "http" && absolute_url.scheme() != "https" {
        return None;
    }
    absolute_url.set_fragment(None);
    Some(absolute_url.to_string())
}
