// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - [`model`] holds the serde-mapped TOML sections.
//! - [`loader`] reads the file.
//! - [`validate`] turns a `RawConfigFile` into a `ConfigFile`.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    ConfigFile, EngineSection, ExecutorSection, LayoutSection, RawConfigFile,
};
