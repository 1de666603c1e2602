// src/exec/mod.rs

//! Build execution layer.
//!
//! The engine only decides what to build; rendering and asset processing
//! belong to an external collaborator behind [`BuildExecutor`].
//!
//! - [`backend`] defines the trait and the merged [`BuildOutcome`].
//! - [`command`] runs a configured shell command, sending the plan as JSON
//!   on stdin and reading JSON-lines unit reports from stdout.

pub mod backend;
pub mod command;

pub use backend::{BuildExecutor, BuildOutcome};
pub use command::CommandExecutor;
