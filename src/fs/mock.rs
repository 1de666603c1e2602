// src/fs/mock.rs

use super::{FileMeta, FileSystem};
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File { content: Vec<u8>, modified_ms: u64 },
    /// A file that exists but refuses to be read (permission error).
    Unreadable,
    Dir(Vec<String>), // List of child names
}

#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, MockEntry>>>,
    clock: Arc<Mutex<u64>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        let mut files = HashMap::new();
        // Ensure root exists
        files.insert(PathBuf::from("."), MockEntry::Dir(Vec::new()));

        Self {
            files: Arc::new(Mutex::new(files)),
            clock: Arc::new(Mutex::new(1_000)),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<PathBuf, MockEntry>> {
        self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn tick(&self) -> u64 {
        let mut clock = self.clock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *clock += 1;
        *clock
    }

    /// Create or overwrite a file. Every write advances the mock clock, so
    /// the modification time always changes.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let modified_ms = self.tick();
        self.insert_entry(
            path.as_ref(),
            MockEntry::File {
                content: content.into(),
                modified_ms,
            },
        );
    }

    /// Bump the modification time without changing the contents.
    pub fn touch(&self, path: impl AsRef<Path>) {
        let modified_ms = self.tick();
        let mut files = self.entries();
        if let Some(MockEntry::File { modified_ms: m, .. }) = files.get_mut(path.as_ref()) {
            *m = modified_ms;
        }
    }

    /// Register a path that exists but can't be read.
    pub fn add_unreadable(&self, path: impl AsRef<Path>) {
        self.insert_entry(path.as_ref(), MockEntry::Unreadable);
    }

    /// Delete a file, unlinking it from its parent directory.
    pub fn remove_file(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut files = self.entries();
        files.remove(path);
        let parent = parent_or_root(path);
        if let (Some(MockEntry::Dir(children)), Some(name)) = (
            files.get_mut(parent),
            path.file_name().and_then(|n| n.to_str()),
        ) {
            children.retain(|c| c != name);
        }
    }

    fn insert_entry(&self, path: &Path, entry: MockEntry) {
        let path = path.to_path_buf();
        let mut files = self.entries();
        files.insert(path.clone(), entry);

        // Ensure parent directories exist implicitly for simplicity in this mock
        if path.parent().is_some() {
            let parent = parent_or_root(&path);
            Self::ensure_dir_entry(&mut files, parent);
            link_child(&mut files, parent, &path);
        }
    }

    fn ensure_dir_entry(files: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
        if files.contains_key(path) {
            return;
        }
        files.insert(path.to_path_buf(), MockEntry::Dir(Vec::new()));
        if path.parent().is_some() {
            let parent = parent_or_root(path);
            if parent != path {
                // Avoid infinite loop at root
                Self::ensure_dir_entry(files, parent);
                link_child(files, parent, path);
            }
        }
    }
}

fn parent_or_root(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn link_child(files: &mut HashMap<PathBuf, MockEntry>, parent: &Path, child: &Path) {
    if let (Some(MockEntry::Dir(children)), Some(name)) = (
        files.get_mut(parent),
        child.file_name().and_then(|n| n.to_str()),
    ) {
        if !children.iter().any(|c| c == name) {
            children.push(name.to_string());
        }
    }
}

impl FileSystem for MockFileSystem {
    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        let files = self.entries();
        match files.get(path) {
            Some(MockEntry::File { content, .. }) => Ok(Box::new(Cursor::new(content.clone()))),
            Some(MockEntry::Unreadable) => Err(anyhow!("Permission denied: {:?}", path)),
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn metadata(&self, path: &Path) -> Result<FileMeta> {
        let files = self.entries();
        match files.get(path) {
            Some(MockEntry::File {
                content,
                modified_ms,
            }) => Ok(FileMeta {
                size: content.len() as u64,
                modified_ms: *modified_ms,
            }),
            Some(MockEntry::Unreadable) => Err(anyhow!("Permission denied: {:?}", path)),
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.entries().contains_key(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(
            self.entries().get(path),
            Some(MockEntry::File { .. }) | Some(MockEntry::Unreadable)
        )
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.entries().get(path), Some(MockEntry::Dir(_)))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let files = self.entries();
        match files.get(path) {
            Some(MockEntry::Dir(children)) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }
}
