//! Export of stored pages to JSON or CSV

use crate::output::traits::{OutputError, OutputResult};
use crate::storage::{Storage, StoredPage};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Export file format, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> OutputResult<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            _ => Err(OutputError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

#[derive(Serialize)]
struct ExportedPage<'a> {
    #[serde(flatten)]
    page: &'a StoredPage,
    media: Vec<String>,
}

const CSV_HEADER: [&str; 11] = [
    "url",
    "final_url",
    "domain",
    "title",
    "content_snippet",
    "content_type",
    "depth",
    "link_count",
    "fetched_at",
    "updated_at",
    "media",
];

/// Writes every stored page to `path`, returning the number exported
pub fn export_pages(storage: &dyn Storage, path: &Path) -> OutputResult<usize> {
    let format = ExportFormat::from_path(path)?;
    let pages = storage.list_pages()?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;

    match format {
        ExportFormat::Json => {
            let mut exported = Vec::with_capacity(pages.len());
            for page in &pages {
                exported.push(ExportedPage {
                    page,
                    media: storage.media_for_page(&page.url)?,
                });
            }
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &exported)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        ExportFormat::Csv => {
            let mut writer = csv::Writer::from_writer(file);
            writer.write_record(CSV_HEADER)?;
            for page in &pages {
                let media = storage.media_for_page(&page.url)?.join(";");
                writer.write_record([
                    page.url.as_str(),
                    page.final_url.as_str(),
                    page.domain.as_str(),
                    page.title.as_str(),
                    page.content_snippet.as_str(),
                    page.content_type.as_deref().unwrap_or(""),
                    &page.depth.to_string(),
                    &page.link_count.to_string(),
                    page.fetched_at.as_str(),
                    page.updated_at.as_str(),
                    media.as_str(),
                ])?;
            }
            writer.flush()?;
        }
    }

    Ok(pages.len())
}
