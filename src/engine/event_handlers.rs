// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use std::time::Instant;

use tracing::{debug, info};

use crate::engine::core::CoordinatorCore;
use crate::engine::{BuildResult, CoordinatorState, DecideInput};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Fire `DebounceElapsed` at this instant.
    ArmDebounce(Instant),
    /// Classify and plan, then report `Decided`.
    Decide(DecideInput),
    /// Execute the decision that was just reported as having work.
    StartBuild,
    /// Request that the process exits.
    RequestExit,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    pub(crate) fn cont(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }

    pub(crate) fn exit() -> Self {
        Self {
            commands: vec![CoreCommand::RequestExit],
            keep_running: false,
        }
    }
}

/// New paths from the watcher.
///
/// - Idle: open a collecting window; its deadline never moves.
/// - Collecting: join the current batch.
/// - Deciding/Building: coalesce into the queued batch.
pub fn handle_paths_changed(core: &mut CoordinatorCore, paths: Vec<String>, now: Instant) -> CoreStep {
    if paths.is_empty() {
        return CoreStep::cont(Vec::new());
    }
    match core.state {
        CoordinatorState::Idle => {
            let deadline = now + core.options.debounce;
            core.batch.extend(paths);
            core.state = CoordinatorState::Collecting { deadline };
            debug!(paths = core.batch.len(), "collecting window opened");
            CoreStep::cont(vec![CoreCommand::ArmDebounce(deadline)])
        }
        CoordinatorState::Collecting { .. } => {
            core.batch.extend(paths);
            CoreStep::cont(Vec::new())
        }
        CoordinatorState::Deciding | CoordinatorState::Building => {
            core.queue.push(paths);
            CoreStep::cont(Vec::new())
        }
    }
}

/// The collecting window closed: decide the batch.
pub fn handle_debounce_elapsed(core: &mut CoordinatorCore) -> CoreStep {
    if !matches!(core.state, CoordinatorState::Collecting { .. }) {
        return CoreStep::cont(Vec::new());
    }
    let mut paths: Vec<String> = std::mem::take(&mut core.batch).into_iter().collect();
    paths.extend(std::mem::take(&mut core.carry));
    start_deciding(core, paths)
}

pub fn handle_decided(core: &mut CoordinatorCore, has_work: bool) -> CoreStep {
    if core.state != CoordinatorState::Deciding {
        return CoreStep::cont(Vec::new());
    }
    if has_work {
        core.state = CoordinatorState::Building;
        return CoreStep::cont(vec![CoreCommand::StartBuild]);
    }
    debug!("plan is empty; nothing to build");
    core.in_flight.clear();
    after_work(core)
}

pub fn handle_build_finished(core: &mut CoordinatorCore, result: BuildResult) -> CoreStep {
    if core.state != CoordinatorState::Building {
        return CoreStep::cont(Vec::new());
    }
    let in_flight = std::mem::take(&mut core.in_flight);
    if result == BuildResult::Failed {
        info!(paths = in_flight.len(), "build failed; its paths join the next batch");
        core.carry.extend(in_flight);
    }
    after_work(core)
}

/// Shutdown.
///
/// - Collecting: close the window early and build the batch, then exit.
/// - Deciding/Building: exit once the current build is done.
/// - Idle: exit now.
pub fn handle_shutdown(core: &mut CoordinatorCore) -> CoreStep {
    match core.state {
        CoordinatorState::Collecting { .. } => {
            core.shutdown_requested = true;
            let mut paths: Vec<String> = std::mem::take(&mut core.batch).into_iter().collect();
            paths.extend(std::mem::take(&mut core.carry));
            info!(paths = paths.len(), "shutdown requested; building the collected batch first");
            start_deciding(core, paths)
        }
        CoordinatorState::Deciding | CoordinatorState::Building => {
            info!("shutdown requested; waiting for the current build");
            core.shutdown_requested = true;
            CoreStep::cont(Vec::new())
        }
        CoordinatorState::Idle => CoreStep::exit(),
    }
}

/// Enter Deciding for `paths`.
pub(crate) fn start_deciding(core: &mut CoordinatorCore, mut paths: Vec<String>) -> CoreStep {
    paths.sort();
    paths.dedup();
    core.in_flight = paths.clone();
    core.state = CoordinatorState::Deciding;
    debug!(paths = paths.len(), "deciding batch");
    CoreStep::cont(vec![CoreCommand::Decide(DecideInput::Paths(paths))])
}

/// A decision or build finished: shut down, start the queued batch without a
/// new window, or go idle.
fn after_work(core: &mut CoordinatorCore) -> CoreStep {
    if core.shutdown_requested {
        core.state = CoordinatorState::Idle;
        return CoreStep::exit();
    }
    if !core.queue.is_empty() {
        let mut paths = core.queue.drain();
        paths.extend(std::mem::take(&mut core.carry));
        return start_deciding(core, paths);
    }
    core.state = CoordinatorState::Idle;
    if core.options.exit_when_idle {
        info!("idle with nothing queued; exiting");
        return CoreStep::exit();
    }
    CoreStep::cont(Vec::new())
}
