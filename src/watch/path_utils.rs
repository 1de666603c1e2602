// src/watch/path_utils.rs

//! Path handling for watcher events.

use std::path::Path;

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Tries a plain `strip_prefix(root)` first; if the event path uses a
/// different absolute prefix for the same directory (symlinks, macOS
/// `/private/var`), both sides are canonicalized and stripped again.
///
/// Returns `None` if the path lies outside `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(normalize(rel));
    }

    // Deleted files can't be canonicalized; only the parent still exists.
    let root_canon = root.canonicalize().ok()?;
    if let Ok(path_canon) = path.canonicalize() {
        return path_canon.strip_prefix(&root_canon).ok().map(normalize);
    }
    let parent = path.parent()?.canonicalize().ok()?;
    let rel_parent = parent.strip_prefix(&root_canon).ok()?;
    Some(normalize(&rel_parent.join(path.file_name()?)))
}

fn normalize(rel: &Path) -> String {
    rel.to_string_lossy().replace('\\', "/")
}
