//! Orphan removal in the destination directory.
//!
//! `orphans = everything under dest − (expected files ∪ their ancestors)`.
//!
//! The expected set must come from the outputs of the build in progress.
//! Removal is best effort: failures are collected in the [`CleanupReport`]
//! and logged, and never abort the build.

use crate::scan::{DirState, probe_dir};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Outcome of a cleanup pass.
#[derive(Debug, Default)]
pub struct CleanupReport {
    /// Orphans removed, top-most paths only.
    pub removed: Vec<PathBuf>,
    /// Paths that could not be inspected or removed, with the reason.
    pub failures: Vec<(PathBuf, String)>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.removed.is_empty() && self.failures.is_empty()
    }
}

/// The expected files plus every ancestor directory strictly below `dest`.
pub fn expected_set(dest: &Path, files: impl IntoIterator<Item = PathBuf>) -> BTreeSet<PathBuf> {
    let mut expected = BTreeSet::new();
    for file in files {
        let mut current = file.parent();
        while let Some(dir) = current {
            if dir == dest || !dir.starts_with(dest) || !expected.insert(dir.to_path_buf()) {
                break;
            }
            current = dir.parent();
        }
        expected.insert(file);
    }
    expected
}

/// Top-most entries under `dest` that are not expected. Descendants of an
/// orphan directory are not listed separately.
pub fn find_orphans(dest: &Path, expected: &BTreeSet<PathBuf>) -> (Vec<PathBuf>, Vec<(PathBuf, String)>) {
    let mut orphans = Vec::new();
    let mut failures = Vec::new();
    let mut walker = WalkDir::new(dest)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();

    while let Some(entry) = walker.next() {
        match entry {
            Ok(entry) => {
                if expected.contains(entry.path()) {
                    continue;
                }
                orphans.push(entry.path().to_path_buf());
                if entry.file_type().is_dir() {
                    walker.skip_current_dir();
                }
            }
            Err(e) => {
                let path = e.path().unwrap_or(dest).to_path_buf();
                failures.push((path, e.to_string()));
            }
        }
    }
    (orphans, failures)
}

/// Remove every orphan under `dest`.
pub fn cleanup(dest: &Path, expected: &BTreeSet<PathBuf>) -> CleanupReport {
    let mut report = CleanupReport::default();
    match probe_dir(dest) {
        DirState::Present => {}
        DirState::Absent => return report,
        DirState::Error(e) => {
            warn!(path = %dest.display(), error = %e, "cannot inspect destination");
            report.failures.push((dest.to_path_buf(), e.to_string()));
            return report;
        }
    }

    let (orphans, failures) = find_orphans(dest, expected);
    report.failures.extend(failures);

    for orphan in orphans {
        let result = match fs::symlink_metadata(&orphan) {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(&orphan),
            Ok(_) => fs::remove_file(&orphan),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                debug!(path = %orphan.display(), "removed orphan");
                report.removed.push(orphan);
            }
            Err(e) => {
                warn!(path = %orphan.display(), error = %e, "failed to remove orphan");
                report.failures.push((orphan, e.to_string()));
            }
        }
    }
    report
}
