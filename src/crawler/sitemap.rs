//! Sitemap expansion
//!
//! Turns a sitemap or sitemap index URL into the page URLs it lists.
//! Nested sitemaps are followed; any failure is logged and contributes no
//! URLs.

use futures::future::BoxFuture;
use reqwest::Client;
use sitemap::reader::{SiteMapEntity, SiteMapReader};
use std::collections::HashSet;
use std::io::Cursor;
use tracing::{debug, info, warn};

/// Upper bound on URLs taken from one sitemap tree
pub const MAX_SITEMAP_URLS: usize = 50_000;

/// Fetches a sitemap and returns every page URL in document order
pub async fn expand_sitemap(client: &Client, sitemap_url: &str) -> Vec<String> {
    let mut collected = Vec::new();
    let mut seen_urls = HashSet::new();
    let mut seen_sitemaps = HashSet::new();

    collect(
        client,
        sitemap_url,
        &mut collected,
        &mut seen_urls,
        &mut seen_sitemaps,
    )
    .await;

    if collected.is_empty() {
        warn!("Sitemap {} yielded no URLs", sitemap_url);
    } else {
        info!("Sitemap {} yielded {} URLs", sitemap_url, collected.len());
    }
    collected
}

fn collect<'a>(
    client: &'a Client,
    sitemap_url: &'a str,
    collected: &'a mut Vec<String>,
    seen_urls: &'a mut HashSet<String>,
    seen_sitemaps: &'a mut HashSet<String>,
) -> BoxFuture<'a, ()> {
    Box::pin(async move {
        if collected.len() >= MAX_SITEMAP_URLS || !seen_sitemaps.insert(sitemap_url.to_string()) {
            return;
        }

        let body = match fetch_body(client, sitemap_url).await {
            Some(body) => body,
            None => return,
        };

        let mut children = Vec::new();
        for entity in SiteMapReader::new(Cursor::new(body.into_bytes())) {
            if collected.len() >= MAX_SITEMAP_URLS {
                warn!(
                    "Sitemap {} truncated at {} URLs",
                    sitemap_url, MAX_SITEMAP_URLS
                );
                break;
            }

            match entity {
                SiteMapEntity::Url(entry) => {
                    if let Some(loc) = entry.loc.get_url() {
                        let loc = loc.to_string();
                        if seen_urls.insert(loc.clone()) {
                            collected.push(loc);
                        }
                    }
                }
                SiteMapEntity::SiteMap(entry) => {
                    if let Some(loc) = entry.loc.get_url() {
                        children.push(loc.to_string());
                    }
                }
                SiteMapEntity::Err(e) => debug!("Sitemap {} entry error: {:?}", sitemap_url, e),
            }
        }

        for child in children {
            debug!("Following nested sitemap {}", child);
            collect(client, &child, collected, seen_urls, seen_sitemaps).await;
        }
    })
}

async fn fetch_body(client: &Client, sitemap_url: &str) -> Option<String> {
    let response = match client.get(sitemap_url).send().await {
        Ok(response) => response,
        Err(e) => {
            warn!("Failed to fetch sitemap {}: {}", sitemap_url, e);
            return None;
        }
    };

    if !response.status().is_success() {
        warn!(
            "Failed to fetch sitemap {}: HTTP {}",
            sitemap_url,
            response.status()
        );
        return None;
    }

    match response.text().await {
        Ok(body) => Some(body),
        Err(e) => {
            warn!("Failed to read sitemap {}: {}", sitemap_url, e);
            None
        }
    }
}
