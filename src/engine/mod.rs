// src/engine/mod.rs

//! Watch/trigger coordinator.
//!
//! The coordinator walks `Idle -> Collecting -> Deciding -> Building -> Idle`:
//! - file events open a collecting window of fixed length, measured from the
//!   first event of the batch;
//! - when the window closes the batch is classified and planned;
//! - a non-empty plan is built, one build at a time;
//! - events arriving while deciding or building are coalesced into a single
//!   queued batch that is decided as soon as the current build finishes.
//!
//! The pure core state machine lives in [`core`] (handlers in
//! [`event_handlers`]); the async/IO shell is implemented in [`runtime`].

use std::time::{Duration, Instant};

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Exit once idle with nothing queued (`--once`).
    pub exit_when_idle: bool,
    /// Length of the collecting window.
    pub debounce: Duration,
}

/// How the result of a build looks to the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildResult {
    Committed,
    /// The executor failed; nothing was committed.
    Failed,
}

/// Events flowing into the core from the watcher and the IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEvent {
    /// Root-relative paths reported by the watcher.
    PathsChanged(Vec<String>),
    /// The collecting window closed.
    DebounceElapsed,
    /// Classification and planning finished.
    Decided { has_work: bool },
    BuildFinished(BuildResult),
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

/// Coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    Collecting { deadline: Instant },
    Deciding,
    Building,
}

/// What to classify in the Deciding state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecideInput {
    /// Scan the whole site against the snapshot (startup).
    Reconcile,
    Paths(Vec<String>),
}

pub mod core;
pub mod event_handlers;
pub mod queue;
pub mod runtime;

pub use self::core::CoordinatorCore;
pub use event_handlers::{CoreCommand, CoreStep};
pub use queue::BatchQueue;
pub use runtime::{Runtime, ShellOptions};
