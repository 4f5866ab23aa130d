//! Final report rendering.
//!
//! Log lines go to stderr through `tracing`; the end-of-run report goes to
//! stdout, either as a colored table or as JSON.

use crate::dir_walker::{FailureKind, Summary};
use colored::*;

/// Renders the end-of-run report.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Prints the per-category table, totals and any failures.
    pub fn summary_table(summary: &Summary) {
        Self::header(if summary.dry_run {
            "DRY RUN SUMMARY"
        } else {
            "SUMMARY"
        });

        for line in Self::table_lines(summary) {
            println!("{}", line);
        }

        if summary.has_failures() {
            Self::header("FAILURES");
            for failure in &summary.failures {
                let kind = match failure.kind {
                    FailureKind::DirectoryRead => "folder",
                    FailureKind::Transfer => "file",
                };
                eprintln!(
                    "{} {} {}: {}",
                    "✗".red(),
                    kind,
                    failure.path.display(),
                    failure.message
                );
            }
            Self::warning(&format!(
                "{} entries could not be processed. Please review errors above.",
                summary.failures.len()
            ));
        } else {
            Self::success(&summary.to_string());
        }
    }

    /// Prints the summary as pretty JSON.
    pub fn json(summary: &Summary) -> Result<(), serde_json::Error> {
        println!("{}", serde_json::to_string_pretty(summary)?);
        Ok(())
    }

    fn table_lines(summary: &Summary) -> Vec<String> {
        let rows: Vec<(String, usize)> = summary
            .per_category
            .iter()
            .map(|(category, count)| (category.dir_name().to_string(), *count))
            .collect();

        let width = rows
            .iter()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or(0)
            .max(8); // At least "Category" width

        let mut lines = Vec::with_capacity(rows.len() + 4);
        lines.push(format!(
            "{:<width$} | {}",
            "Category".bold(),
            "Files".bold(),
            width = width
        ));
        lines.push("-".repeat(width + 10));
        for (name, count) in &rows {
            lines.push(format!(
                "{:<width$} | {} {}",
                name,
                count.to_string().green(),
                plural(*count),
                width = width
            ));
        }
        lines.push("-".repeat(width + 10));

        let total = summary.files_handled();
        lines.push(format!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total.to_string().green().bold(),
            plural(total),
            width = width
        ));
        lines
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}
