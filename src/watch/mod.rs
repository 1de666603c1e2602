// src/watch/mod.rs

//! File watching.
//!
//! Wires a cross-platform filesystem watcher (`notify`) into the runtime
//! event channel. It does **not** classify or fingerprint anything; it only
//! turns filesystem events into root-relative path batches.

pub mod path_utils;
pub mod watcher;

pub use watcher::{spawn_watcher, WatcherHandle};
