// src/cache/mod.rs

//! On-disk persistence of named snapshots.
//!
//! Every snapshot is a JSON envelope `{schema_version, index, payload}`
//! compressed with zstd and written atomically (temp file, fsync, rename).
//! Anything that can't be decoded into the expected envelope is a cold start,
//! not an error. This module knows nothing about what it stores.

mod error;
mod store;

pub use error::CacheError;
pub use store::{CacheStore, ColdStartReason, LoadOutcome};

/// Snapshot format version. Bump when any persisted shape changes.
pub const SCHEMA_VERSION: u32 = 1;

/// File records plus the dependency graph.
pub const BUILD_CACHE: &str = "build-cache";
/// Asset import map.
pub const ASSET_DEPS: &str = "asset-deps";
/// Page metadata index.
pub const PAGE_METADATA: &str = "page-metadata";
/// Taxonomy membership index.
pub const TAXONOMY_INDEX: &str = "taxonomy-index";

const COMPRESSED_EXT: &str = "json.zst";
const LEGACY_EXT: &str = "json";
const ZSTD_LEVEL: i32 = 3;
