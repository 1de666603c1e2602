// src/detect/mod.rs

//! Change detection against the last known file snapshot.
//!
//! Every candidate path is fingerprinted by content (blake3), so a touch
//! without an edit is `Unchanged`. Paths that exist but can't be read are
//! reported as `Unreadable` and never assumed unchanged.

pub mod fingerprint;

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::fs::{walk_files, FileSystem};

pub use fingerprint::{compute_file_hash, fingerprint_file};

/// Last known state of one tracked source path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Root-relative, `/`-separated path. Identity of the record.
    pub path: String,
    /// blake3 hex digest of the contents.
    pub fingerprint: String,
    pub size: u64,
    pub modified_ms: u64,
}

/// Outcome of comparing one path against its prior record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Unchanged,
    Added,
    Modified,
    Deleted,
    Unreadable,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Unchanged => "unchanged",
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Unreadable => "unreadable",
        };
        f.write_str(s)
    }
}

/// Classification of a single path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub path: String,
    pub kind: ChangeKind,
    /// Fresh record for paths that could be read (`Unchanged`, `Added`,
    /// `Modified`). Committed to the snapshot only after the build.
    pub record: Option<FileRecord>,
}

impl Classification {
    pub fn new(path: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            record: None,
        }
    }

    pub fn is_change(&self) -> bool {
        self.kind != ChangeKind::Unchanged
    }
}

/// Compares live filesystem state with a map of prior [`FileRecord`]s.
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
}

impl ChangeDetector {
    pub fn new(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Classify each candidate path (root-relative) against `records`.
    ///
    /// Duplicates are collapsed. A directory stands for every file below
    /// it, so a moved or deleted folder classifies its contents. Paths that
    /// are gone and were never recorded (editor temp files) are dropped.
    pub fn classify<I, S>(&self, records: &HashMap<String, FileRecord>, paths: I) -> Vec<Classification>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique = BTreeSet::new();
        for rel in paths {
            self.expand(records, rel.into(), &mut unique);
        }
        unique
            .into_iter()
            .filter_map(|rel| self.classify_one(records, rel))
            .collect()
    }

    /// Push `rel`, or for a directory (present or vanished) every file it
    /// holds plus every recorded path below it.
    fn expand(&self, records: &HashMap<String, FileRecord>, rel: String, out: &mut BTreeSet<String>) {
        let abs = self.root.join(&rel);
        let is_dir = self.fs.is_dir(&abs);
        let vanished_untracked = !is_dir && !self.fs.exists(&abs) && !records.contains_key(&rel);
        if !is_dir && !vanished_untracked {
            out.insert(rel);
            return;
        }

        let prefix = format!("{}/", rel.trim_end_matches('/'));
        let below = records.keys().filter(|k| k.starts_with(&prefix)).cloned();
        out.extend(below);
        if is_dir {
            let files = walk_files(self.fs.as_ref(), &abs, |dir, err| {
                warn!(dir = ?dir, error = %err, "could not list changed directory");
            });
            out.extend(files.iter().filter_map(|p| self.relative(p)));
        } else {
            out.insert(rel);
        }
    }

    fn classify_one(&self, records: &HashMap<String, FileRecord>, rel: String) -> Option<Classification> {
        let abs = self.root.join(&rel);
        let prior = records.get(&rel);

        if !self.fs.exists(&abs) {
            return match prior {
                Some(_) => Some(Classification::new(rel, ChangeKind::Deleted)),
                None => {
                    debug!(path = %rel, "ignoring vanished untracked path");
                    None
                }
            };
        }

        match fingerprint_file(self.fs.as_ref(), &abs, &rel) {
            Ok(record) => {
                let kind = match prior {
                    None => ChangeKind::Added,
                    Some(p) if p.fingerprint == record.fingerprint => ChangeKind::Unchanged,
                    Some(_) => ChangeKind::Modified,
                };
                Some(Classification {
                    path: rel,
                    kind,
                    record: Some(record),
                })
            }
            Err(err) => {
                warn!(path = %rel, error = %err, "could not fingerprint file");
                Some(Classification::new(rel, ChangeKind::Unreadable))
            }
        }
    }

    /// Classify every file under the root plus every recorded path.
    ///
    /// Used at startup, when events that happened while the process was down
    /// are lost. `include` filters root-relative paths (e.g. excludes).
    pub fn scan(
        &self,
        records: &HashMap<String, FileRecord>,
        include: impl Fn(&str) -> bool,
    ) -> Vec<Classification> {
        let mut unreadable_dirs = Vec::new();
        let files = walk_files(self.fs.as_ref(), &self.root, |dir, err| {
            warn!(dir = ?dir, error = %err, "could not list directory during scan");
            unreadable_dirs.push(dir.to_path_buf());
        });

        let mut candidates: BTreeSet<String> = files
            .iter()
            .filter_map(|p| self.relative(p))
            .filter(|rel| include(rel))
            .collect();

        // Recorded paths below an unlistable directory would otherwise look
        // deleted; they are unknown instead.
        let mut unreadable = Vec::new();
        for rel in records.keys() {
            let abs = self.root.join(rel);
            if unreadable_dirs.iter().any(|d| abs.starts_with(d)) {
                unreadable.push(Classification::new(rel.clone(), ChangeKind::Unreadable));
            } else if include(rel) {
                candidates.insert(rel.clone());
            }
        }

        let mut out = self.classify(records, candidates);
        out.extend(unreadable);
        out
    }

    fn relative(&self, path: &Path) -> Option<String> {
        path.strip_prefix(&self.root)
            .ok()
            .map(|rel| rel.to_string_lossy().replace('\\', "/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn detector(fs: &MockFileSystem) -> ChangeDetector {
        ChangeDetector::new(Arc::new(fs.clone()), ".")
    }

    fn records_for(det: &ChangeDetector, paths: &[&str]) -> HashMap<String, FileRecord> {
        det.classify(&HashMap::new(), paths.iter().map(|p| p.to_string()))
            .into_iter()
            .filter_map(|c| c.record)
            .map(|r| (r.path.clone(), r))
            .collect()
    }

    fn changes_only(classifications: &[Classification]) -> Vec<&Classification> {
        classifications.iter().filter(|c| c.is_change()).collect()
    }

    fn kind_of(out: &[Classification], path: &str) -> Option<ChangeKind> {
        out.iter().find(|c| c.path == path).map(|c| c.kind)
    }

    #[test]
    fn classifies_all_five_kinds() {
        let fs = MockFileSystem::new();
        fs.add_file("./same.md", "same");
        fs.add_file("./edited.md", "before");
        fs.add_file("./gone.md", "bye");
        fs.add_file("./locked.md", "secret");
        let det = detector(&fs);
        let records = records_for(&det, &["same.md", "edited.md", "gone.md", "locked.md"]);

        fs.touch("./same.md");
        fs.add_file("./edited.md", "after");
        fs.remove_file("./gone.md");
        fs.add_unreadable("./locked.md");
        fs.add_file("./new.md", "hello");

        let out = det.classify(
            &records,
            ["same.md", "edited.md", "gone.md", "locked.md", "new.md"],
        );
        assert_eq!(kind_of(&out, "same.md"), Some(ChangeKind::Unchanged));
        assert_eq!(kind_of(&out, "edited.md"), Some(ChangeKind::Modified));
        assert_eq!(kind_of(&out, "gone.md"), Some(ChangeKind::Deleted));
        assert_eq!(kind_of(&out, "locked.md"), Some(ChangeKind::Unreadable));
        assert_eq!(kind_of(&out, "new.md"), Some(ChangeKind::Added));
    }

    #[test]
    fn vanished_untracked_paths_and_duplicates_are_dropped() {
        let fs = MockFileSystem::new();
        fs.add_file("./a.md", "a");
        let det = detector(&fs);

        let out = det.classify(&HashMap::new(), ["a.md", "a.md", ".a.md.swp"]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, ChangeKind::Added);
    }

    #[test]
    fn scan_finds_offline_changes() {
        let fs = MockFileSystem::new();
        fs.add_file("./content/a.md", "a");
        fs.add_file("./content/b.md", "b");
        let det = detector(&fs);
        let records = records_for(&det, &["content/a.md", "content/b.md"]);

        fs.remove_file("./content/b.md");
        fs.add_file("./content/c.md", "c");
        fs.add_file("./public/index.html", "out");

        let out = det.scan(&records, |rel| !rel.starts_with("public/"));
        let changed: Vec<_> = changes_only(&out)
            .into_iter()
            .map(|c| (c.path.as_str(), c.kind))
            .collect();
        assert_eq!(
            changed,
            vec![
                ("content/b.md", ChangeKind::Deleted),
                ("content/c.md", ChangeKind::Added),
            ]
        );
    }

    #[test]
    fn moved_directory_classifies_its_files() {
        let fs = MockFileSystem::new();
        fs.add_file("./content/old/a.md", "a");
        fs.add_file("./content/old/deep/b.md", "b");
        fs.add_file("./content/keep.md", "k");
        let det = detector(&fs);
        let records = records_for(
            &det,
            &["content/old/a.md", "content/old/deep/b.md", "content/keep.md"],
        );

        fs.remove_file("./content/old/a.md");
        fs.remove_file("./content/old/deep/b.md");
        fs.add_file("./content/new/a.md", "a");
        fs.add_file("./content/new/deep/b.md", "b");

        // The watcher only reports the two directory names.
        let out = det.classify(&records, ["content/old", "content/new"]);
        let changed: Vec<_> = changes_only(&out)
            .into_iter()
            .map(|c| (c.path.as_str(), c.kind))
            .collect();
        assert_eq!(
            changed,
            vec![
                ("content/new/a.md", ChangeKind::Added),
                ("content/new/deep/b.md", ChangeKind::Added),
                ("content/old/a.md", ChangeKind::Deleted),
                ("content/old/deep/b.md", ChangeKind::Deleted),
            ]
        );
        assert_eq!(kind_of(&out, "content/keep.md"), None);
    }
}
