//! Tree walking and match collection.

use crate::patterns::{MatchKind, RemovalRule};

use ignore::WalkBuilder;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use walkdir::WalkDir;

/// VCS internal directories, left alone when `ScanOptions::skip_vcs` is set.
pub const VCS_INTERNALS: &[&str] = &[
    ".git", ".jj", ".svn", ".hg", ".bzr", "_darcs", ".pijul", "CVS", ".fossil",
];

/// Options controlling a walk
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Directory names that are never entered
    pub exclude: Vec<String>,
    /// Never enter VCS internals such as `.git`
    pub skip_vcs: bool,
    /// Draw a spinner on stderr while walking
    pub show_progress: bool,
}

/// What kind of filesystem entry a match refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
    Symlink,
}

/// An entry selected for removal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub path: PathBuf,
    pub kind: EntryKind,
    /// The rule pattern that selected this entry
    pub pattern: String,
}

/// Check whether a directory name was excluded by the user
pub fn is_excluded(name: &str, excludes: &[String]) -> bool {
    excludes.iter().any(|exclude| exclude == name)
}

/// Walk `root` and collect every entry matching one of `rules`.
///
/// Matched directories are not descended into, so their contents never show
/// up as separate matches. The root itself is never a match. Symlinks are not
/// followed. A missing root produces no matches.
pub fn scan(root: &Path, rules: &[RemovalRule], options: &ScanOptions) -> Vec<Match> {
    if fs::symlink_metadata(root).is_err() {
        tracing::debug!(root = %root.display(), "root does not exist, nothing to scan");
        return Vec::new();
    }

    let progress = if options.show_progress {
        let progress = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            progress.set_style(style);
        }
        progress.enable_steady_tick(Duration::from_millis(100));
        progress
    } else {
        ProgressBar::hidden()
    };

    let directory_rules: Vec<RemovalRule> = rules
        .iter()
        .filter(|r| r.kind == MatchKind::DirectoryName)
        .cloned()
        .collect();

    // Directory matches are recorded from inside the filter so the walker
    // never enters them.
    let dir_matches = Arc::new(Mutex::new(Vec::<Match>::new()));
    let dir_matches_clone = Arc::clone(&dir_matches);
    let exclude_clone = options.exclude.clone();
    let skip_vcs = options.skip_vcs;

    let walker = WalkBuilder::new(root)
        .hidden(false)
        .parents(false)
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(move |entry| {
            if entry.depth() == 0 {
                return true;
            }

            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            if !is_dir {
                return true;
            }

            let name = entry.file_name().to_string_lossy();
            if skip_vcs && VCS_INTERNALS.contains(&name.as_ref()) {
                tracing::debug!(path = %entry.path().display(), "skipping VCS directory");
                return false;
            }
            if is_excluded(&name, &exclude_clone) {
                tracing::debug!(path = %entry.path().display(), "skipping excluded directory");
                return false;
            }

            if let Some(rule) = directory_rules.iter().find(|r| r.matches(&name, true)) {
                dir_matches_clone
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(Match {
                        path: entry.path().to_path_buf(),
                        kind: EntryKind::Directory,
                        pattern: rule.pattern.clone(),
                    });
                return false;
            }

            true
        })
        .build();

    let mut matches = Vec::new();
    let mut entries_scanned = 0u64;

    for result in walker {
        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!("failed to access entry under {}: {}", root.display(), err);
                continue;
            }
        };

        entries_scanned += 1;
        if entries_scanned % 100 == 0 {
            progress.set_message(format!("{} entries scanned", entries_scanned));
        }

        if entry.depth() == 0 {
            continue;
        }

        let Some(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if let Some(rule) = rules.iter().find(|r| r.matches(&name, false)) {
            let kind = if file_type.is_symlink() {
                EntryKind::Symlink
            } else {
                EntryKind::File
            };
            matches.push(Match {
                path: entry.path().to_path_buf(),
                kind,
                pattern: rule.pattern.clone(),
            });
        }
    }

    progress.finish_and_clear();

    matches.extend(
        dir_matches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..),
    );
    matches.sort_by(|a, b| a.path.cmp(&b.path));

    tracing::debug!(
        root = %root.display(),
        scanned = entries_scanned,
        matched = matches.len(),
        "scan finished"
    );

    matches
}

/// Size in bytes of a matched entry without following symlinks
pub fn entry_size(path: &Path, kind: EntryKind) -> u64 {
    match kind {
        EntryKind::Directory => WalkDir::new(path)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| e.metadata().ok())
            .map(|m| m.len())
            .sum(),
        EntryKind::File | EntryKind::Symlink => {
            fs::symlink_metadata(path).map(|m| m.len()).unwrap_or(0)
        }
    }
}
