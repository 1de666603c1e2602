// src/cache/error.rs

use std::path::PathBuf;

use thiserror::Error;

/// Failures of the cache store that can't be treated as a cold start.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to create state directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode snapshot '{name}': {source}")]
    Encode {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to compress snapshot '{name}': {source}")]
    Compress {
        name: String,
        #[source]
        source: std::io::Error,
    },
}
