// src/cache/store.rs

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{CacheError, COMPRESSED_EXT, LEGACY_EXT, SCHEMA_VERSION, ZSTD_LEVEL};

/// Why a snapshot could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColdStartReason {
    Missing,
    Corrupt,
    SchemaMismatch { found: u32, expected: u32 },
    WrongIndex { found: String },
}

impl fmt::Display for ColdStartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColdStartReason::Missing => f.write_str("no snapshot on disk"),
            ColdStartReason::Corrupt => f.write_str("snapshot could not be decoded"),
            ColdStartReason::SchemaMismatch { found, expected } => {
                write!(f, "schema version {found}, expected {expected}")
            }
            ColdStartReason::WrongIndex { found } => {
                write!(f, "snapshot belongs to index '{found}'")
            }
        }
    }
}

/// Result of loading one named snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome<T> {
    Loaded(T),
    ColdStart(ColdStartReason),
}

impl<T> LoadOutcome<T> {
    pub fn is_cold(&self) -> bool {
        matches!(self, LoadOutcome::ColdStart(_))
    }
}

impl<T: Default> LoadOutcome<T> {
    /// The payload (or an empty default) plus the cold-start reason, if any.
    pub fn into_parts(self) -> (T, Option<ColdStartReason>) {
        match self {
            LoadOutcome::Loaded(value) => (value, None),
            LoadOutcome::ColdStart(reason) => (T::default(), Some(reason)),
        }
    }
}

#[derive(Serialize)]
struct EnvelopeOut<'a, T> {
    schema_version: u32,
    index: &'a str,
    payload: &'a T,
}

#[derive(Deserialize)]
struct EnvelopeHeader {
    schema_version: u32,
    index: String,
}

#[derive(Deserialize)]
struct EnvelopePayload<T> {
    payload: T,
}

/// Directory of named, versioned snapshots.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    /// Open (and create if needed) the state directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| CacheError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn compressed_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{COMPRESSED_EXT}"))
    }

    pub fn legacy_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{LEGACY_EXT}"))
    }

    /// Load `name`, preferring the compressed file over the legacy one.
    ///
    /// A compressed file that can't be used falls back to a legacy file
    /// still on disk; the compressed file's reason is reported only when
    /// neither loads.
    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Result<LoadOutcome<T>, CacheError> {
        let compressed = match read_if_exists(&self.compressed_path(name))? {
            Some(bytes) => match zstd::decode_all(bytes.as_slice()) {
                Ok(json) => Some(decode_envelope(name, &json)),
                Err(_) => Some(LoadOutcome::ColdStart(ColdStartReason::Corrupt)),
            },
            None => None,
        };
        let compressed = match compressed {
            Some(LoadOutcome::Loaded(value)) => return Ok(LoadOutcome::Loaded(value)),
            other => other,
        };

        if let Some(bytes) = read_if_exists(&self.legacy_path(name))? {
            let legacy = decode_envelope(name, &bytes);
            if !legacy.is_cold() || compressed.is_none() {
                return Ok(legacy);
            }
        }
        Ok(compressed.unwrap_or(LoadOutcome::ColdStart(ColdStartReason::Missing)))
    }

    /// Persist `value` as the compressed snapshot `name`.
    ///
    /// A legacy file for the same name is removed once the new one is in
    /// place.
    pub fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<(), CacheError> {
        let json = encode_envelope(name, value)?;
        let compressed =
            zstd::encode_all(json.as_slice(), ZSTD_LEVEL).map_err(|source| CacheError::Compress {
                name: name.to_string(),
                source,
            })?;
        atomic_write(&self.compressed_path(name), &compressed)?;
        remove_if_exists(&self.legacy_path(name))
    }

    /// Delete both forms of snapshot `name`.
    pub fn invalidate(&self, name: &str) -> Result<(), CacheError> {
        remove_if_exists(&self.compressed_path(name))?;
        remove_if_exists(&self.legacy_path(name))
    }

    /// Persist `value` in the uncompressed legacy format.
    pub fn save_legacy<T: Serialize>(&self, name: &str, value: &T) -> Result<(), CacheError> {
        let json = encode_envelope(name, value)?;
        atomic_write(&self.legacy_path(name), &json)
    }

}

fn encode_envelope<T: Serialize>(name: &str, value: &T) -> Result<Vec<u8>, CacheError> {
    let envelope = EnvelopeOut {
        schema_version: SCHEMA_VERSION,
        index: name,
        payload: value,
    };
    serde_json::to_vec_pretty(&envelope).map_err(|source| CacheError::Encode {
        name: name.to_string(),
        source,
    })
}

fn decode_envelope<T: DeserializeOwned>(name: &str, json: &[u8]) -> LoadOutcome<T> {
    let Ok(header) = serde_json::from_slice::<EnvelopeHeader>(json) else {
        return LoadOutcome::ColdStart(ColdStartReason::Corrupt);
    };
    if header.schema_version != SCHEMA_VERSION {
        return LoadOutcome::ColdStart(ColdStartReason::SchemaMismatch {
            found: header.schema_version,
            expected: SCHEMA_VERSION,
        });
    }
    if header.index != name {
        return LoadOutcome::ColdStart(ColdStartReason::WrongIndex {
            found: header.index,
        });
    }
    match serde_json::from_slice::<EnvelopePayload<T>>(json) {
        Ok(envelope) => LoadOutcome::Loaded(envelope.payload),
        Err(_) => LoadOutcome::ColdStart(ColdStartReason::Corrupt),
    }
}

fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>, CacheError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(CacheError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn remove_if_exists(path: &Path) -> Result<(), CacheError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(CacheError::Write {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Write to a sibling temp file, fsync it, then rename over `dest`.
fn atomic_write(dest: &Path, data: &[u8]) -> Result<(), CacheError> {
    let mut tmp_name = dest.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let write = || -> io::Result<()> {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp_path, dest)
    };
    write().map_err(|source| {
        let _ = fs::remove_file(&tmp_path);
        CacheError::Write {
            path: dest.to_path_buf(),
            source,
        }
    })
}
