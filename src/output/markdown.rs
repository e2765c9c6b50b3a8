//! Markdown run report
//!
//! Written next to the chapter records so a user can see which resources
//! need manual follow-up.

use crate::output::stats::{ResourceKind, RunReport};
use crate::storage::{write_atomic, StorageResult};
use std::path::Path;

/// File name of the report under the output root
pub const REPORT_FILE: &str = "report.md";

/// Writes the run report as markdown
///
/// # Arguments
///
/// * `report` - The run snapshot
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote the report
/// * `Err(StorageError)` - Failed to write the report
pub fn write_markdown_report(report: &RunReport, output_path: &Path) -> StorageResult<()> {
    let markdown = format_markdown_report(report);
    write_atomic(output_path, markdown.as_bytes(), true)?;
    Ok(())
}

/// Formats a run report as markdown
pub fn format_markdown_report(report: &RunReport) -> String {
    let mut md = String::new();

    md.push_str(&format!("# {}\n\n", report.book_title));

    md.push_str("## Run Information\n\n");
    md.push_str(&format!(
        "- **Started**: {}\n",
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    md.push_str(&format!(
        "- **Finished**: {}\n",
        report.finished_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    md.push_str(&format!(
        "- **Duration**: {} seconds\n",
        report.duration_seconds()
    ));
    if let Some(hash) = &report.config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    md.push('\n');

    md.push_str("## Statistics\n\n");
    md.push_str("| Resource | Total | Fetched | Cached | Failed |\n");
    md.push_str("|----------|-------|---------|--------|--------|\n");
    md.push_str(&format!(
        "| Chapters | {} | {} | {} | {} |\n",
        report.chapters_total,
        report.chapters_fetched,
        report.chapters_cached(),
        count_kind(report, ResourceKind::Chapter)
    ));
    md.push_str(&format!(
        "| Images | {} | {} | {} | {} |\n\n",
        report.images_total,
        report.images_fetched,
        report.images_done.saturating_sub(report.images_fetched),
        count_kind(report, ResourceKind::Image)
    ));
    md.push_str(&format!(
        "- **Chapter Success Rate**: {:.2}%\n",
        report.chapter_success_rate()
    ));
    match &report.cover {
        Some(cover) => md.push_str(&format!("- **Cover**: `{}`\n\n", cover.display())),
        None => md.push_str("- **Cover**: none\n\n"),
    }

    if report.failures.is_empty() {
        md.push_str("No failures.\n");
        return md;
    }

    md.push_str("## Failures\n\n");
    md.push_str("| Kind | Chapter | URL | Reason |\n");
    md.push_str("|------|---------|-----|--------|\n");
    for failure in &report.failures {
        let chapter = failure
            .chapter_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        md.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            failure.kind,
            chapter,
            failure.url,
            failure.reason.replace('|', "\\|")
        ));
    }

    md
}

fn count_kind(report: &RunReport, kind: ResourceKind) -> usize {
    report.failures.iter().filter(|f| f.kind == kind).count()
}
