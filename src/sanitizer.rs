//! Best-effort removal pass driven by a policy.
//!
//! Categories are handled one after another, each with its own walk of the
//! tree. Every deletion attempt is recorded; a failed attempt never stops the
//! run, it just ends up in the report.

use crate::patterns::{Category, Policy};
use crate::report::ProgressSink;
use crate::scanner::{entry_size, scan, EntryKind, ScanOptions};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Options controlling a sanitize run
#[derive(Debug, Clone, Default)]
pub struct SanitizeOptions {
    /// Walk and report, but delete nothing
    pub dry_run: bool,
    pub scan: ScanOptions,
}

/// What happened to a single matched entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Removed,
    /// Dry run: the entry matched but was left in place
    WouldRemove,
    /// The entry disappeared between the walk and the delete
    Vanished,
    Failed(String),
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

/// One deletion attempt
#[derive(Debug, Clone)]
pub struct RemovalRecord {
    pub path: PathBuf,
    /// Key of the category whose rule matched
    pub category: String,
    pub kind: EntryKind,
    /// Size measured before the attempt
    pub size: u64,
    pub outcome: Outcome,
}

/// Totals for a set of records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub matched: usize,
    pub removed: usize,
    pub would_remove: usize,
    pub vanished: usize,
    pub failed: usize,
    /// Bytes removed (or that would be removed in a dry run)
    pub bytes: u64,
}

impl Summary {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a RemovalRecord>) -> Self {
        let mut summary = Summary::default();
        for record in records {
            summary.matched += 1;
            match record.outcome {
                Outcome::Removed => {
                    summary.removed += 1;
                    summary.bytes += record.size;
                }
                Outcome::WouldRemove => {
                    summary.would_remove += 1;
                    summary.bytes += record.size;
                }
                Outcome::Vanished => summary.vanished += 1,
                Outcome::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }
}

/// Everything a run attempted, in the order it was attempted
#[derive(Debug, Clone, Default)]
pub struct SanitizeReport {
    pub root: PathBuf,
    pub dry_run: bool,
    pub records: Vec<RemovalRecord>,
}

impl SanitizeReport {
    pub fn summary(&self) -> Summary {
        Summary::from_records(&self.records)
    }

    pub fn category_summary(&self, key: &str) -> Summary {
        Summary::from_records(self.records.iter().filter(|r| r.category == key))
    }

    pub fn failures(&self) -> impl Iterator<Item = &RemovalRecord> {
        self.records.iter().filter(|r| r.outcome.is_failure())
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Delete a single entry, translating the io result into an [`Outcome`]
pub fn remove_entry(path: &Path, kind: EntryKind) -> Outcome {
    let result = match kind {
        EntryKind::Directory => fs::remove_dir_all(path),
        EntryKind::File | EntryKind::Symlink => fs::remove_file(path),
    };

    match result {
        Ok(()) => Outcome::Removed,
        Err(err) if err.kind() == io::ErrorKind::NotFound => Outcome::Vanished,
        Err(err) => Outcome::Failed(err.to_string()),
    }
}

/// Applies a policy to a directory tree
pub struct Sanitizer<'a> {
    policy: &'a Policy,
    options: SanitizeOptions,
}

impl<'a> Sanitizer<'a> {
    pub fn new(policy: &'a Policy, options: SanitizeOptions) -> Self {
        Sanitizer { policy, options }
    }

    /// Process every category in policy order and collect the outcome of each attempt
    pub fn run<S: ProgressSink + ?Sized>(&self, root: &Path, sink: &mut S) -> SanitizeReport {
        let mut report = SanitizeReport {
            root: root.to_path_buf(),
            dry_run: self.options.dry_run,
            records: Vec::new(),
        };

        for category in self.policy.categories() {
            sink.category_started(category);
            let first = report.records.len();
            self.run_category(root, category, &mut report.records, sink);
            let summary = Summary::from_records(&report.records[first..]);
            sink.category_finished(category, &summary);
        }

        let summary = report.summary();
        tracing::info!(
            root = %root.display(),
            matched = summary.matched,
            removed = summary.removed,
            failed = summary.failed,
            dry_run = self.options.dry_run,
            "sanitize finished"
        );

        report
    }

    fn run_category<S: ProgressSink + ?Sized>(
        &self,
        root: &Path,
        category: &Category,
        records: &mut Vec<RemovalRecord>,
        sink: &mut S,
    ) {
        let matches = scan(root, &category.rules, &self.options.scan);
        tracing::debug!(category = %category.key, matches = matches.len(), "category scanned");

        for m in matches {
            let mut size = entry_size(&m.path, m.kind);
            let outcome = if self.options.dry_run {
                // Nothing is deleted in a dry run, so later categories still
                // see entries an earlier one already claimed.
                if records.iter().any(|r| m.path.starts_with(&r.path)) {
                    tracing::trace!(path = %m.path.display(), "already claimed by an earlier match");
                    continue;
                }
                let claimed: u64 = records
                    .iter()
                    .filter(|r| r.path.starts_with(&m.path))
                    .map(|r| r.size)
                    .sum();
                size = size.saturating_sub(claimed);
                Outcome::WouldRemove
            } else {
                remove_entry(&m.path, m.kind)
            };

            match &outcome {
                Outcome::Failed(err) => {
                    tracing::warn!(path = %m.path.display(), "could not remove: {}", err)
                }
                Outcome::Vanished => {
                    tracing::debug!(path = %m.path.display(), "already gone")
                }
                _ => tracing::trace!(path = %m.path.display(), pattern = %m.pattern, "processed"),
            }

            let record = RemovalRecord {
                path: m.path,
                category: category.key.clone(),
                kind: m.kind,
                size,
                outcome,
            };
            sink.entry_processed(&record);
            records.push(record);
        }
    }
}

/// Run the given policy over `root` without progress output
pub fn sanitize(root: &Path, policy: &Policy, options: SanitizeOptions) -> SanitizeReport {
    Sanitizer::new(policy, options).run(root, &mut crate::report::NullSink)
}
