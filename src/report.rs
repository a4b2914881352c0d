//! Human-readable progress and summary output.

use crate::patterns::{Category, Policy};
use crate::sanitizer::{Outcome, RemovalRecord, SanitizeReport, Summary};

use colored::Colorize;
use humansize::{format_size, BINARY};

/// Receives progress notifications during a sanitize run
pub trait ProgressSink {
    fn category_started(&mut self, _category: &Category) {}

    fn entry_processed(&mut self, _record: &RemovalRecord) {}

    fn category_finished(&mut self, _category: &Category, _summary: &Summary) {}
}

/// Discards all progress
pub struct NullSink;

impl ProgressSink for NullSink {}

/// Prints progress to stdout, one line per category
pub struct ConsoleReporter {
    dry_run: bool,
    /// Print every processed path, not just per-category totals
    list: bool,
    quiet: bool,
}

impl ConsoleReporter {
    pub fn new(dry_run: bool, list: bool, quiet: bool) -> Self {
        ConsoleReporter {
            dry_run,
            list,
            quiet,
        }
    }

    /// Print totals, any failures, and the completion line
    pub fn finish(&self, report: &SanitizeReport) {
        let summary = report.summary();

        println!("========================================");
        println!("Root: {}", report.root.display());
        let totals = totals_line(&summary, self.dry_run);
        if self.dry_run {
            println!("{}", totals.bold());
        } else {
            println!("{}", totals.bold().green());
        }

        let failures: Vec<&RemovalRecord> = report.failures().collect();
        if !failures.is_empty() {
            println!(
                "{}",
                format!("Could not remove {} entries:", failures.len()).yellow()
            );
            for record in failures {
                if let Outcome::Failed(err) = &record.outcome {
                    println!("  - {}: {}", record.path.display(), err);
                }
            }
        }

        if self.dry_run {
            println!("Dry run mode: nothing was deleted.");
        }
        println!("Sanitization complete.");
    }
}

impl ProgressSink for ConsoleReporter {
    fn entry_processed(&mut self, record: &RemovalRecord) {
        if !self.list || self.quiet {
            return;
        }
        let verb = match &record.outcome {
            Outcome::Removed => "Removed",
            Outcome::WouldRemove => "Would remove",
            Outcome::Vanished => "Already gone",
            Outcome::Failed(_) => "Failed",
        };
        println!(
            "  {}: {} ({})",
            verb,
            record.path.display(),
            format_size(record.size, BINARY)
        );
    }

    fn category_finished(&mut self, category: &Category, summary: &Summary) {
        if self.quiet {
            return;
        }
        let line = category_line(&category.label, summary, self.dry_run);
        if summary.failed > 0 {
            println!("{}", line.yellow());
        } else {
            println!("{}", line);
        }
    }
}

/// The progress line printed after a category has been processed
pub fn category_line(label: &str, summary: &Summary, dry_run: bool) -> String {
    if summary.matched == 0 {
        return format!("{}: nothing to remove", label);
    }

    let mut line = if dry_run {
        format!(
            "{}: would remove {} ({})",
            label,
            plural(summary.would_remove),
            format_size(summary.bytes, BINARY)
        )
    } else {
        format!(
            "{}: removed {} ({})",
            label,
            plural(summary.removed),
            format_size(summary.bytes, BINARY)
        )
    };

    if summary.vanished > 0 {
        line.push_str(&format!(", {} already gone", summary.vanished));
    }
    if summary.failed > 0 {
        line.push_str(&format!(", {} failed", summary.failed));
    }
    line
}

/// Overall totals line for the end of a run
pub fn totals_line(summary: &Summary, dry_run: bool) -> String {
    if dry_run {
        format!(
            "Would remove {} ({})",
            plural(summary.would_remove),
            format_size(summary.bytes, BINARY)
        )
    } else {
        format!(
            "Removed {} ({})",
            plural(summary.removed),
            format_size(summary.bytes, BINARY)
        )
    }
}

/// Render the policy table, one rule per line under its category
pub fn policy_lines(policy: &Policy) -> Vec<String> {
    let mut lines = Vec::new();
    for category in policy.categories() {
        lines.push(format!("{} [{}]", category.label, category.key));
        for rule in &category.rules {
            lines.push(format!("  {:<10} {}", rule.kind.to_string(), rule.pattern));
        }
    }
    lines
}

fn plural(count: usize) -> String {
    if count == 1 {
        "1 entry".to_string()
    } else {
        format!("{} entries", count)
    }
}
