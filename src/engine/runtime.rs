// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::errors::{Result, SiteGraphError};
use crate::exec::BuildExecutor;
use crate::planner::{BuildPlan, BuildRequest, BuildStats};
use crate::session::{BuildSession, Decision};
use crate::types::VersionScope;

use super::core::CoordinatorCore;
use super::{BuildResult, CoreCommand, DecideInput, RuntimeEvent};

/// Options that only the IO shell cares about.
#[derive(Debug, Clone, Default)]
pub struct ShellOptions {
    /// Startup reconcile ignores the snapshot and rebuilds everything.
    pub full: bool,
    /// Scope restriction applied to every request.
    pub scope: Option<VersionScope>,
    /// Print plans as JSON on stdout instead of executing them.
    pub dry_run: bool,
}

/// Work currently running off the event loop. The session is moved in and
/// comes back with the result.
enum InFlight {
    Deciding(JoinHandle<(BuildSession, Decision)>),
    Building(JoinHandle<(BuildSession, Result<BuildStats>)>),
}

enum Completion {
    Decided(std::result::Result<(BuildSession, Decision), tokio::task::JoinError>),
    Built(std::result::Result<(BuildSession, Result<BuildStats>), tokio::task::JoinError>),
}

enum Wake {
    Event(Option<RuntimeEvent>),
    Timer,
    Done(Completion),
}

async fn next_completion(in_flight: &mut Option<InFlight>) -> Completion {
    match in_flight {
        Some(InFlight::Deciding(handle)) => Completion::Decided(handle.await),
        Some(InFlight::Building(handle)) => Completion::Built(handle.await),
        None => std::future::pending().await,
    }
}

/// Drives the coordinator core in response to `RuntimeEvent`s and runs the
/// decide/build work it asks for.
///
/// At most one decision or build is in flight; it owns the session until it
/// completes.
pub struct Runtime {
    core: CoordinatorCore,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    rx_closed: bool,
    session: Option<BuildSession>,
    executor: Option<Arc<dyn BuildExecutor>>,
    options: ShellOptions,
    deadline: Option<Instant>,
    decision: Option<Decision>,
    in_flight: Option<InFlight>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// `executor = None` means plans are only logged.
    pub fn new(
        core: CoordinatorCore,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        session: BuildSession,
        executor: Option<Arc<dyn BuildExecutor>>,
        options: ShellOptions,
    ) -> Self {
        Self {
            core,
            event_rx,
            rx_closed: false,
            session: Some(session),
            executor,
            options,
            deadline: None,
            decision: None,
            in_flight: None,
        }
    }

    /// Main event loop. Returns the session once the core asks to stop.
    ///
    /// Fatal errors (state directory I/O, a panicked worker) end the loop
    /// with `Err`; executor failures only fail the current build.
    pub async fn run(mut self) -> Result<BuildSession> {
        info!("sitegraph runtime started");

        let step = self.core.start();
        let mut keep_running = step.keep_running;
        for command in step.commands {
            self.execute_command(command)?;
        }

        while keep_running {
            let deadline = self.deadline;
            let wake = tokio::select! {
                event = self.event_rx.recv(), if !self.rx_closed => Wake::Event(event),
                _ = sleep_until(deadline), if deadline.is_some() => Wake::Timer,
                done = next_completion(&mut self.in_flight), if self.in_flight.is_some() => Wake::Done(done),
            };

            let event = match wake {
                Wake::Event(Some(event)) => event,
                Wake::Event(None) => {
                    info!("runtime event channel closed; shutting down");
                    self.rx_closed = true;
                    RuntimeEvent::ShutdownRequested
                }
                Wake::Timer => {
                    self.deadline = None;
                    RuntimeEvent::DebounceElapsed
                }
                Wake::Done(done) => {
                    self.in_flight = None;
                    self.complete(done)?
                }
            };

            debug!(?event, "runtime received event");
            let step = self.core.step(event, Instant::now());
            for command in step.commands {
                self.execute_command(command)?;
            }
            keep_running = step.keep_running;
        }

        info!("runtime exiting");
        self.session
            .take()
            .ok_or_else(|| SiteGraphError::Other(anyhow!("session still in flight at exit")))
    }

    fn complete(&mut self, done: Completion) -> Result<RuntimeEvent> {
        match done {
            Completion::Decided(joined) => {
                let (session, decision) = joined.map_err(|e| anyhow!("decide task failed: {e}"))?;
                self.session = Some(session);
                let has_work = decision.has_work() && self.accept(decision)?;
                Ok(RuntimeEvent::Decided { has_work })
            }
            Completion::Built(joined) => {
                let (session, result) = joined.map_err(|e| anyhow!("build task failed: {e}"))?;
                self.session = Some(session);
                match result {
                    Ok(_) => Ok(RuntimeEvent::BuildFinished(BuildResult::Committed)),
                    Err(err @ (SiteGraphError::Cache(_) | SiteGraphError::IoError(_))) => Err(err),
                    Err(err) => {
                        error!(error = %err, "build failed; snapshot left untouched");
                        Ok(RuntimeEvent::BuildFinished(BuildResult::Failed))
                    }
                }
            }
        }
    }

    /// Keep a decision for building, or report it in plan-only modes.
    /// Returns true if a build should follow.
    fn accept(&mut self, decision: Decision) -> Result<bool> {
        if self.options.dry_run {
            print_plan(&decision.plan)?;
            return Ok(false);
        }
        if self.executor.is_none() {
            log_plan(&decision.plan);
            return Ok(false);
        }
        self.decision = Some(decision);
        Ok(true)
    }

    fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::ArmDebounce(deadline) => {
                self.deadline = Some(deadline);
            }
            CoreCommand::Decide(input) => {
                let session = self.take_session()?;
                let full = self.options.full;
                let scope = self.options.scope.clone();
                let handle = tokio::task::spawn_blocking(move || {
                    let decision = match input {
                        DecideInput::Reconcile => session.reconcile(full, scope),
                        DecideInput::Paths(paths) => {
                            session.decide(&BuildRequest::incremental(paths).with_scope(scope))
                        }
                    };
                    (session, decision)
                });
                self.in_flight = Some(InFlight::Deciding(handle));
            }
            CoreCommand::StartBuild => {
                let mut session = self.take_session()?;
                let decision = self
                    .decision
                    .take()
                    .ok_or_else(|| anyhow!("StartBuild without a decision"))?;
                let executor = self
                    .executor
                    .clone()
                    .ok_or_else(|| anyhow!("StartBuild without an executor"))?;
                let handle = tokio::spawn(async move {
                    let result = session.execute(decision, executor.as_ref()).await;
                    (session, result)
                });
                self.in_flight = Some(InFlight::Building(handle));
            }
            CoreCommand::RequestExit => {
                info!("core issued RequestExit command");
            }
        }
        Ok(())
    }

    fn take_session(&mut self) -> Result<BuildSession> {
        self.session
            .take()
            .ok_or_else(|| SiteGraphError::Other(anyhow!("session is already in use")))
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

fn print_plan(plan: &BuildPlan) -> Result<()> {
    let json = serde_json::to_string_pretty(plan).map_err(anyhow::Error::from)?;
    println!("{json}");
    Ok(())
}

fn log_plan(plan: &BuildPlan) {
    match &plan.full_rebuild {
        Some(reason) => info!(reason = %reason, "plan: full rebuild (no executor configured)"),
        None => info!(
            rebuild = ?plan.rebuild,
            assets = ?plan.assets,
            removed = ?plan.removed,
            deferred = ?plan.deferred,
            "plan (no executor configured)"
        ),
    }
}
