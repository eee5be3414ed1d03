use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use driftnet::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns true when the URL's host equals `domain` (case-insensitive)
///
/// Subdomains do not match: `blog.example.com` is not `example.com`.
pub fn same_host(url: &Url, domain: &str) -> bool {
    url.host_str()
        .map(|h| h.eq_ignore_ascii_case(domain))
        .unwrap_or(false)
}

/// Returns true when the URL path ends in `.xml`, marking a sitemap seed
pub fn is_sitemap_url(url: &Url) -> bool {
    url.path().to_ascii_lowercase().ends_with(".xml")
}
