//! SQLite-backed record sink
//!
//! Runs every incoming record through the change detector against the
//! stored history, then saves it.

use crate::change::{check_for_changes, ChangeRecord};
use crate::crawler::PageRecord;
use crate::output::traits::{OutputResult, RecordSink};
use crate::storage::{RunStatus, Storage};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Record sink that writes to a [`Storage`] backend
pub struct SqliteSink {
    storage: Box<dyn Storage + Send>,
    run_id: i64,
    screenshot_dir: Option<PathBuf>,
    saved: u64,
    changed: u64,
}

impl SqliteSink {
    /// Opens a new run in `storage`
    pub fn new(
        mut storage: Box<dyn Storage + Send>,
        seed: &str,
        config_hash: &str,
    ) -> OutputResult<Self> {
        let run_id = storage.create_run(seed, config_hash)?;
        info!("Started run {}", run_id);
        Ok(Self {
            storage,
            run_id,
            screenshot_dir: None,
            saved: 0,
            changed: 0,
        })
    }

    /// Writes screenshots carried by records into `dir`
    pub fn with_screenshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.screenshot_dir = Some(dir.into());
        self
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    /// Records saved so far
    pub fn saved(&self) -> u64 {
        self.saved
    }

    /// Saved records whose content differed from their stored history
    pub fn changed(&self) -> u64 {
        self.changed
    }

    fn save_screenshot(&self, dir: &Path, record: &PageRecord, png: &[u8]) {
        let path = dir.join(screenshot_name(&record.url));
        let result = std::fs::create_dir_all(dir).and_then(|_| std::fs::write(&path, png));
        match result {
            Ok(()) => debug!("Saved screenshot {}", path.display()),
            Err(e) => warn!("Failed to save screenshot for {}: {}", record.url, e),
        }
    }
}

impl RecordSink for SqliteSink {
    fn record(&mut self, record: &PageRecord) -> OutputResult<ChangeRecord> {
        let change = check_for_changes(self.storage.as_ref(), &record.url, &record.text_snippet)?;
        self.storage.save_record(self.run_id, record)?;
        self.saved += 1;
        if change.is_different {
            self.changed += 1;
        }

        if let (Some(dir), Some(png)) = (&self.screenshot_dir, &record.screenshot) {
            self.save_screenshot(dir, record, png);
        }

        Ok(change)
    }

    fn finalize(&mut self, status: RunStatus) -> OutputResult<()> {
        self.storage.finish_run(self.run_id, status)?;
        info!(
            "Run {} {}: {} records saved, {} changed",
            self.run_id,
            status.to_db_string(),
            self.saved,
            self.changed
        );
        Ok(())
    }
}

fn screenshot_name(url: &str) -> String {
    let stem: String = url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(120)
        .collect();
    format!("{}.png", stem)
}
