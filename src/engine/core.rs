// src/engine/core.rs

//! Pure coordinator state machine.
//!
//! Consumes [`RuntimeEvent`]s (plus the current instant) and produces the
//! next state and a list of commands for the IO shell. No channels, no
//! Tokio types, no IO: the whole coordination policy is unit-testable with
//! plain values.

use std::collections::BTreeSet;
use std::time::Instant;

use crate::engine::event_handlers::{
    handle_build_finished, handle_debounce_elapsed, handle_decided, handle_paths_changed,
    handle_shutdown, CoreCommand, CoreStep,
};
use crate::engine::queue::BatchQueue;
use crate::engine::{CoordinatorState, DecideInput, RuntimeEvent, RuntimeOptions};

#[derive(Debug)]
pub struct CoordinatorCore {
    pub(crate) state: CoordinatorState,
    /// Paths collected in the current window.
    pub(crate) batch: BTreeSet<String>,
    /// Paths that arrived while deciding or building.
    pub(crate) queue: BatchQueue,
    /// Paths of a failed build, retried with the next batch.
    pub(crate) carry: BTreeSet<String>,
    /// Paths of the batch being decided or built.
    pub(crate) in_flight: Vec<String>,
    pub(crate) options: RuntimeOptions,
    pub(crate) shutdown_requested: bool,
}

impl CoordinatorCore {
    pub fn new(options: RuntimeOptions) -> Self {
        Self {
            state: CoordinatorState::Idle,
            batch: BTreeSet::new(),
            queue: BatchQueue::new(),
            carry: BTreeSet::new(),
            in_flight: Vec::new(),
            options,
            shutdown_requested: false,
        }
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == CoordinatorState::Idle
    }

    pub fn queue_is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Startup: reconcile the snapshot with the tree before watching.
    pub fn start(&mut self) -> CoreStep {
        self.state = CoordinatorState::Deciding;
        self.in_flight.clear();
        CoreStep::cont(vec![CoreCommand::Decide(DecideInput::Reconcile)])
    }

    /// Handle a single event and return the commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent, now: Instant) -> CoreStep {
        match event {
            RuntimeEvent::PathsChanged(paths) => handle_paths_changed(self, paths, now),
            RuntimeEvent::DebounceElapsed => handle_debounce_elapsed(self),
            RuntimeEvent::Decided { has_work } => handle_decided(self, has_work),
            RuntimeEvent::BuildFinished(result) => handle_build_finished(self, result),
            RuntimeEvent::ShutdownRequested => handle_shutdown(self),
        }
    }
}
