//! Change detection between successive snapshots of a page
//!
//! Compares a newly extracted text snippet with the last stored snippet for the
//! same URL and describes the difference.

mod similarity;

pub use similarity::ratio;

use crate::storage::{Storage, StorageResult};
use serde::Serialize;

/// Character delta beyond which a change counts as major
const MAJOR_CHANGE_CHARS: i64 = 100;

/// Result of comparing two versions of a page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeRecord {
    pub is_different: bool,
    /// Similarity in `[0, 1]`; 1.0 means identical
    pub similarity_ratio: f64,
    pub summary: String,
}

impl ChangeRecord {
    fn new(is_different: bool, similarity_ratio: f64, summary: impl Into<String>) -> Self {
        Self {
            is_different,
            similarity_ratio,
            summary: summary.into(),
        }
    }
}

/// Compares a new snippet against the previous one, if any
///
/// - no previous snippet: different, ratio 0.0, "New URL"
/// - either side empty: not different, ratio 0.0, "Empty content"
/// - otherwise the similarity ratio decides; the summary names the kind of
///   change and the signed character delta, e.g. `"Modified (+12 chars)"`
///
/// # Examples
///
/// ```
/// use driftnet::change::compare;
///
/// let change = compare(Some("hello world"), "hello world");
/// assert!(!change.is_different);
/// assert_eq!(change.similarity_ratio, 1.0);
/// ```
pub fn compare(previous: Option<&str>, new: &str) -> ChangeRecord {
    let previous = match previous {
        None => return ChangeRecord::new(true, 0.0, "New URL"),
        Some(previous) => previous,
    };

    if previous.is_empty() || new.is_empty() {
        return ChangeRecord::new(false, 0.0, "Empty content");
    }

    let similarity = ratio(previous, new);
    let delta = new.chars().count() as i64 - previous.chars().count() as i64;
    let kind = if delta > MAJOR_CHANGE_CHARS {
        "Major Addition"
    } else if delta < -MAJOR_CHANGE_CHARS {
        "Major Deletion"
    } else {
        "Modified"
    };

    ChangeRecord::new(
        similarity < 1.0,
        similarity,
        format!("{} ({:+} chars)", kind, delta),
    )
}

/// Compares a new snippet with the newest stored snapshot of `url`
pub fn check_for_changes(
    storage: &dyn Storage,
    url: &str,
    new_snippet: &str,
) -> StorageResult<ChangeRecord> {
    let previous = storage.latest_snapshot(url)?;
    Ok(compare(
        previous.as_ref().map(|s| s.content_snippet.as_str()),
        new_snippet,
    ))
}

/// URLs that have more than one stored snapshot
pub fn urls_with_history(storage: &dyn Storage) -> StorageResult<Vec<String>> {
    storage.urls_with_history()
}
