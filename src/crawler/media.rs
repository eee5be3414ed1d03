//! Media downloads
//!
//! Saves images and PDFs referenced by a page into the media directory.
//! Failures are logged and the file is left out of the page record.

use crate::config::MediaConfig;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

/// Filename used when the URL path has no final segment
const FALLBACK_NAME: &str = "downloaded_file";

#[derive(Debug, Error)]
enum MediaError {
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

pub struct MediaDownloader {
    client: Client,
    directory: PathBuf,
    timeout: Duration,
}

impl MediaDownloader {
    pub fn new(client: Client, config: &MediaConfig) -> Self {
        Self {
            client,
            directory: PathBuf::from(&config.directory),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Downloads every URL in order, returning the paths that were saved
    pub async fn download_all(&self, urls: &[String]) -> Vec<String> {
        let mut saved = Vec::new();
        for url in urls {
            if let Some(path) = self.download(url).await {
                saved.push(path);
            }
        }
        saved
    }

    /// Downloads one file, returning its saved path
    pub async fn download(&self, url: &str) -> Option<String> {
        match tokio::time::timeout(self.timeout, self.try_download(url)).await {
            Ok(Ok(path)) => {
                info!("Downloaded media: {}", path.display());
                Some(path.to_string_lossy().into_owned())
            }
            Ok(Err(e)) => {
                warn!("Failed to download media {}: {}", url, e);
                None
            }
            Err(_) => {
                warn!(
                    "Failed to download media {}: {}",
                    url,
                    MediaError::Timeout(self.timeout)
                );
                None
            }
        }
    }

    async fn try_download(&self, url: &str) -> Result<PathBuf, MediaError> {
        let parsed = Url::parse(url)?;
        let mut response = self.client.get(parsed.as_str()).send().await?;

        if response.status() != StatusCode::OK {
            debug!("Skipping media {}: HTTP {}", url, response.status());
            return Err(MediaError::Status(response.status().as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        tokio::fs::create_dir_all(&self.directory).await?;
        let path = self
            .directory
            .join(file_name_for(&parsed, content_type.as_deref()));

        let mut file = tokio::fs::File::create(&path).await?;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        Ok(path)
    }
}

/// Last path segment of the URL, or a fallback name with an extension
/// guessed from the content type
fn file_name_for(url: &Url, content_type: Option<&str>) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .map(sanitize)
        .filter(|name| !name.is_empty() && name != "." && name != "..");

    match segment {
        Some(name) => name,
        None => {
            let extension = content_type.and_then(extension_for).unwrap_or("");
            format!("{}{}", FALLBACK_NAME, extension)
        }
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
    match mime.as_str() {
        "image/png" => Some(".png"),
        "image/jpeg" => Some(".jpg"),
        "image/gif" => Some(".gif"),
        "image/webp" => Some(".webp"),
        "image/svg+xml" => Some(".svg"),
        "image/x-icon" | "image/vnd.microsoft.icon" => Some(".ico"),
        "application/pdf" => Some(".pdf"),
        _ => None,
    }
}
