use crate::UrlError;
use url::Url;

/// Query parameters that never change page content and are dropped from claim keys
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid"];

/// Normalizes a URL into the key used to claim it in the visited set
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Require an HTTP(S) scheme and a host
/// 3. Lowercase the host
/// 4. Remove the fragment
/// 5. Remove tracking query parameters (`utm_*`, `fbclid`, `gclid`, `mc_eid`)
/// 6. Remove an empty query string
///
/// Paths, schemes and the order of the remaining parameters are left alone:
/// `http://` and `https://` spellings of a page stay distinct.
///
/// # Examples
///
/// ```
/// use driftnet::url::normalize_url;
///
/// let url = normalize_url("https://Example.COM/page?utm_source=x#top").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/page");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    let host = url
        .host_str()
        .map(|h| h.to_lowercase())
        .ok_or(UrlError::MissingDomain)?;
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    url.set_fragment(None);

    if url.query().is_some() {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !is_tracking_param(key))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let total = url.query_pairs().count();

        if kept.is_empty() {
            url.set_query(None);
        } else if kept.len() != total {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    Ok(url)
}

/// Returns the claim key for a URL string
///
/// Falls back to the trimmed input when the URL cannot be normalized so that a
/// malformed link still claims exactly once.
pub fn claim_key(url_str: &str) -> String {
    normalize_url(url_str)
        .map(String::from)
        .unwrap_or_else(|_| url_str.trim().to_string())
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}
