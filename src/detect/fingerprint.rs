// src/detect/fingerprint.rs

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use blake3::Hasher;

use crate::detect::FileRecord;
use crate::fs::FileSystem;

/// Compute the blake3 hash of a single file's contents.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file = fs
        .open_read(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file
            .read(&mut buf)
            .with_context(|| format!("reading file for hashing: {:?}", path))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Build a fresh [`FileRecord`] for `abs_path`, identified by `rel_path`.
///
/// Metadata is read before hashing; a file that changes in between simply
/// shows up again in the next batch.
pub fn fingerprint_file(fs: &dyn FileSystem, abs_path: &Path, rel_path: &str) -> Result<FileRecord> {
    let meta = fs.metadata(abs_path)?;
    let fingerprint = compute_file_hash(fs, abs_path)?;
    Ok(FileRecord {
        path: rel_path.to_string(),
        fingerprint,
        size: meta.size,
        modified_ms: meta.modified_ms,
    })
}
