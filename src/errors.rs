// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! Only failures that prevent producing any plan at all surface here.
//! Cold-start and ambiguous-change situations are resolved inside the
//! planner by falling back to a full rebuild.

use thiserror::Error;

use crate::cache::CacheError;

#[derive(Error, Debug)]
pub enum SiteGraphError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Cache store error: {0}")]
    Cache(#[from] CacheError),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SiteGraphError>;
