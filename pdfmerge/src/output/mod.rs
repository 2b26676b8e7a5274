//! Output formatting and display for pdfmerge.
//!
//! This module handles all user-facing output including:
//! - Formatted status messages
//! - Merge, plan, info and validation reports
//! - JSON rendering for machine consumers
//!
//! # Examples
//!
//! ```no_run
//! use pdfmerge::output::OutputFormatter;
//! use pdfmerge::config::Config;
//!
//! # fn example(config: Config) {
//! let formatter = OutputFormatter::from_config(&config);
//! formatter.info("Starting merge operation");
//! formatter.success("Merge completed successfully");
//! # }
//! ```

pub mod formatter;

pub use formatter::{MessageLevel, OutputFormatter};

use serde::Serialize;

use crate::config::Config;
use crate::error::{MergeError, Result};
use crate::merge::{MergeOutcome, MergeOutput, MergePlan};
use crate::store::RecentFile;
use crate::utils::{display_name, format_file_size};
use crate::validation::{PdfInfo, ValidationReport};

/// Create an output formatter from configuration.
pub fn create_formatter(config: &Config) -> OutputFormatter {
    OutputFormatter::from_config(config)
}

/// Pretty-printed JSON for any report type.
///
/// # Errors
///
/// [`MergeError::InvalidConfig`] if the value cannot be serialized, which
/// only happens for non-string map keys.
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| MergeError::invalid_config(format!("cannot render JSON: {e}")))
}

/// Compress page indices into a short expression, e.g. `1-3, 7, 5-4`.
///
/// Consecutive runs in either direction collapse into `a-b`.
pub fn summarize_pages(pages: &[u32]) -> String {
    let mut parts = Vec::new();
    let mut i = 0;
    while i < pages.len() {
        let start = pages[i];
        let mut end = i;
        let step = match pages.get(i + 1) {
            Some(&next) if next == start + 1 => 1i64,
            Some(&next) if start > 0 && next == start - 1 => -1,
            _ => 0,
        };
        if step != 0 {
            while let Some(&next) = pages.get(end + 1) {
                if i64::from(next) - i64::from(pages[end]) != step {
                    break;
                }
                end += 1;
            }
        }
        if end > i {
            parts.push(format!("{start}-{}", pages[end]));
        } else {
            parts.push(start.to_string());
        }
        i = end + 1;
    }
    parts.join(", ")
}

/// Display the result of a completed merge.
pub fn display_merge_outcome(formatter: &OutputFormatter, outcome: &MergeOutcome) {
    let stats = &outcome.statistics;
    let target = match &outcome.output {
        MergeOutput::File(path) => path.display().to_string(),
        MergeOutput::Memory(_) => "memory".to_string(),
    };

    formatter.success(&format!(
        "Merged {} page(s) from {} file(s) into {target} ({})",
        stats.total_pages,
        stats.files_merged,
        stats.format_output_size()
    ));

    if stats.copied_verbatim {
        formatter.debug("Single input copied without rewriting");
    }
    formatter.detail("Input size", &stats.format_input_size());
    formatter.detail("Objects written", &stats.objects_written.to_string());
    formatter.detail(
        "Load time",
        &format!("{:.2}s", stats.load_time.as_secs_f64()),
    );
    formatter.detail(
        "Total time",
        &format!("{:.2}s", stats.merge_time.as_secs_f64()),
    );
}

/// Display what a dry run would produce.
pub fn display_plan(formatter: &OutputFormatter, plan: &MergePlan) {
    formatter.section("Dry run: no output written");
    for (index, input) in plan.inputs.iter().enumerate() {
        formatter.list_item(
            index + 1,
            &format!(
                "{} ({} of {} page(s): {})",
                display_name(&input.path),
                input.selected.len(),
                input.page_count,
                summarize_pages(&input.selected)
            ),
        );
    }
    formatter.info(&format!("Output would contain {} page(s)", plan.total_pages));
}

/// Display facts about one PDF.
pub fn display_info(formatter: &OutputFormatter, info: &PdfInfo) {
    formatter.section(&info.name);
    formatter.info(&format!("  Path:    {}", info.path.display()));
    formatter.info(&format!("  Version: {}", info.version));
    formatter.info(&format!("  Pages:   {}", info.page_count));
    formatter.info(&format!("  Size:    {}", info.format_size()));
    if let Some((width, height)) = info.page_dimensions {
        formatter.info(&format!("  Page 1:  {width:.0} x {height:.0} pt"));
    }
    formatter.detail("Objects", &info.object_count.to_string());
}

/// Display a validation report, one line per file.
pub fn display_validation_report(formatter: &OutputFormatter, report: &ValidationReport) {
    for file in &report.files {
        match (&file.page_count, &file.reason) {
            (Some(pages), _) if file.valid => {
                formatter.success(&format!("{}: {pages} page(s)", file.path.display()))
            }
            (_, reason) => formatter.error(&format!(
                "{}: {}",
                file.path.display(),
                reason.as_deref().unwrap_or("invalid")
            )),
        }
    }

    if report.files_failed > 0 {
        formatter.warning(&format!(
            "Warning: {} file(s) failed validation",
            report.files_failed
        ));
    }

    formatter.info(&format!(
        "Validated {} file(s): {} pages, {}",
        report.files_valid,
        report.total_pages,
        report.format_total_size()
    ));
}

/// Display the recent-files list, most recent first.
pub fn display_recent(formatter: &OutputFormatter, entries: &[RecentFile]) {
    if entries.is_empty() {
        formatter.info("No recent files");
        return;
    }
    for (index, entry) in entries.iter().enumerate() {
        formatter.list_item(
            index + 1,
            &format!(
                "{} ({} page(s), {}, {})",
                entry.path.display(),
                entry.page_count,
                format_file_size(entry.size),
                entry.last_opened.format("%Y-%m-%d %H:%M")
            ),
        );
    }
}
