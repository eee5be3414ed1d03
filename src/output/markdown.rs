//! Markdown summary generation
//!
//! This module generates human-readable markdown summaries of crawl results,
//! including run information, task outcomes, and pages whose content changed.

use crate::output::traits::{CrawlSummary, OutputResult};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Number of changed URLs listed before the rest are elided
const CHANGED_URL_LIMIT: usize = 50;

/// Generates a markdown summary and writes it to `output_path`
///
/// # Arguments
///
/// * `summary` - The crawl summary data
/// * `output_path` - Path where the markdown file should be written
pub fn generate_markdown_summary(summary: &CrawlSummary, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(summary);

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a crawl summary as markdown
pub fn format_markdown_summary(summary: &CrawlSummary) -> String {
    let mut md = String::new();

    md.push_str("# Driftnet Crawl Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Run ID**: {}\n", summary.run_id));
    md.push_str(&format!("- **Seed**: {}\n", summary.seed));
    md.push_str(&format!("- **Started**: {}\n", summary.started_at));
    if let Some(finished) = &summary.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished));
    }
    if let Some(duration) = summary.duration_seconds {
        md.push_str(&format!(
            "- **Duration**: {} seconds ({:.2} minutes)\n",
            duration,
            duration as f64 / 60.0
        ));
    }
    md.push_str(&format!("- **Status**: {}\n", summary.status));
    md.push_str(&format!("- **Config Hash**: {}\n\n", summary.config_hash));

    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Pages Stored**: {}\n", summary.total_pages));
    md.push_str(&format!(
        "- **Pages This Run**: {}\n",
        summary.pages_this_run
    ));
    md.push_str(&format!(
        "- **Unique Domains**: {}\n",
        summary.unique_domains
    ));
    md.push_str(&format!("- **Snapshots**: {}\n", summary.total_snapshots));
    md.push_str(&format!("- **Media Files**: {}\n", summary.total_media));
    if !summary.outcomes.is_empty() {
        md.push_str(&format!(
            "- **Tasks Processed**: {}\n",
            summary.tasks_processed()
        ));
        md.push_str(&format!(
            "- **Fetch Success Rate**: {:.2}%\n",
            summary.success_rate()
        ));
    }
    md.push('\n');

    if !summary.outcomes.is_empty() {
        md.push_str("## Task Outcomes\n\n");
        md.push_str("| Outcome | Count |\n");
        md.push_str("|---------|-------|\n");
        for (outcome, count) in &summary.outcomes {
            md.push_str(&format!("| {} | {} |\n", outcome, count));
        }
        md.push('\n');
    }

    if !summary.depth_breakdown.is_empty() {
        md.push_str("## Depth Breakdown\n\n");
        md.push_str("| Depth | Pages |\n");
        md.push_str("|-------|-------|\n");

        let mut depths: Vec<_> = summary.depth_breakdown.iter().collect();
        depths.sort_by_key(|(d, _)| **d);

        for (depth, count) in depths {
            md.push_str(&format!("| {} | {} |\n", depth, count));
        }
        md.push('\n');
    }

    if !summary.changed_urls.is_empty() {
        md.push_str("## Pages With History\n\n");
        md.push_str(&format!(
            "Total: {}\n\n",
            summary.changed_urls.len()
        ));
        for url in summary.changed_urls.iter().take(CHANGED_URL_LIMIT) {
            md.push_str(&format!("- {}\n", url));
        }
        if summary.changed_urls.len() > CHANGED_URL_LIMIT {
            md.push_str(&format!(
                "\n... and {} more\n\n",
                summary.changed_urls.len() - CHANGED_URL_LIMIT
            ));
        } else {
            md.push('\n');
        }
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_summary() -> CrawlSummary {
        let mut summary = CrawlSummary::new();
        summary.run_id = 1;
        summary.seed = "https://example.com/".to_string();
        summary.started_at = "2024-01-01T00:00:00Z".to_string();
        summary.finished_at = Some("2024-01-01T01:00:00Z".to_string());
        summary.duration_seconds = Some(3600);
        summary.status = "completed".to_string();
        summary.config_hash = "abc123".to_string();
        summary.total_pages = 1000;
        summary.unique_domains = 50;
        summary.total_snapshots = 1500;
        summary
    }

    #[test]
    fn test_format_markdown_summary() {
        let summary = create_test_summary();
        let markdown = format_markdown_summary(&summary);

        assert!(markdown.contains("# Driftnet Crawl Summary"));
        assert!(markdown.contains("Run ID"));
        assert!(markdown.contains("https://example.com/"));
        assert!(markdown.contains("- **Pages Stored**: 1000"));
        assert!(markdown.contains("- **Snapshots**: 1500"));
        assert!(!markdown.contains("Task Outcomes"));
    }

    #[test]
    fn test_markdown_with_outcomes() {
        let mut summary = create_test_summary();
        summary.outcomes.insert("emitted".to_string(), 9);
        summary.outcomes.insert("fetch_failed".to_string(), 1);

        let markdown = format_markdown_summary(&summary);

        assert!(markdown.contains("## Task Outcomes"));
        assert!(markdown.contains("| emitted | 9 |"));
        assert!(markdown.contains("| fetch_failed | 1 |"));
        assert!(markdown.contains("90.00%"));
    }

    #[test]
    fn test_markdown_with_depth_breakdown() {
        let mut summary = create_test_summary();
        summary.depth_breakdown.insert(2, 300);
        summary.depth_breakdown.insert(0, 100);
        summary.depth_breakdown.insert(1, 200);

        let markdown = format_markdown_summary(&summary);

        let zero = markdown.find("| 0 | 100 |").unwrap();
        let two = markdown.find("| 2 | 300 |").unwrap();
        assert!(zero < two);
    }

    #[test]
    fn test_changed_urls_are_truncated() {
        let mut summary = create_test_summary();
        summary.changed_urls = (0..60)
            .map(|i| format!("https://example.com/{}", i))
            .collect();

        let markdown = format_markdown_summary(&summary);

        assert!(markdown.contains("Total: 60"));
        assert!(markdown.contains("https://example.com/49\n"));
        assert!(!markdown.contains("https://example.com/50\n"));
        assert!(markdown.contains("... and 10 more"));
    }

    #[test]
    fn test_generate_writes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reports").join("summary.md");

        generate_markdown_summary(&create_test_summary(), &path).unwrap();

        let written = std::fs::read_to_string(path).unwrap();
        assert!(written.starts_with("# Driftnet Crawl Summary"));
    }
}
