// src/session/mod.rs

//! Single owner of the persisted build state.
//!
//! A `BuildSession` is loaded once at startup and moved into whichever task
//! is deciding or building, so nothing else can mutate the graph or the
//! snapshot. Readers subscribe to a frozen copy published after each commit.

mod state;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::config::ConfigFile;
use crate::detect::{Classification, ChangeDetector};
use crate::errors::Result;
use crate::exec::{BuildExecutor, BuildOutcome};
use crate::fs::FileSystem;
use crate::graph::{AssetDeps, DependencyGraph, PageIndex, TaxonomyIndex};
use crate::layout::PathClass;
use crate::planner::{BuildPlan, BuildPlanner, BuildRequest, BuildStats};
use crate::types::VersionScope;

pub use state::SiteState;

/// Read-only view handed to concurrent readers (dev server, tooling).
#[derive(Debug, Clone, Default)]
pub struct FrozenState {
    /// Incremented on every commit.
    pub generation: u64,
    pub graph: DependencyGraph,
    pub pages: PageIndex,
    pub taxonomy: TaxonomyIndex,
    pub asset_deps: AssetDeps,
    pub last_build: Option<BuildStats>,
}

/// A plan together with the detection it was computed from.
#[derive(Debug, Clone)]
pub struct Decision {
    pub request: BuildRequest,
    pub classifications: Vec<Classification>,
    pub plan: BuildPlan,
}

impl Decision {
    /// False when there is nothing to build and nothing to remember.
    pub fn has_work(&self) -> bool {
        !self.plan.is_empty() || !self.plan.deferred.is_empty()
    }
}

pub struct BuildSession {
    store: CacheStore,
    state: SiteState,
    detector: ChangeDetector,
    planner: BuildPlanner,
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    cold: bool,
    generation: u64,
    published: watch::Sender<Arc<FrozenState>>,
}

impl std::fmt::Debug for BuildSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildSession")
            .field("root", &self.root)
            .field("cold", &self.cold)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl BuildSession {
    /// Open the state directory under `root` and load every snapshot.
    pub fn open(cfg: &ConfigFile, root: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Result<Self> {
        let root = root.into();
        let store = CacheStore::open(root.join(&cfg.engine().state_dir))?;
        let (state, cold) = SiteState::load(&store)?;
        for (index, reason) in &cold {
            info!(index = %index, reason = %reason, "snapshot unavailable; starting cold");
        }

        let planner = BuildPlanner::from_config(cfg)?;
        let detector = ChangeDetector::new(fs.clone(), root.clone());
        let (published, _) = watch::channel(Arc::new(FrozenState::default()));

        let session = Self {
            store,
            state,
            detector,
            planner,
            fs,
            root,
            cold: !cold.is_empty(),
            generation: 0,
            published,
        };
        session.publish(None);
        Ok(session)
    }

    pub fn is_cold(&self) -> bool {
        self.cold
    }

    pub fn state(&self) -> &SiteState {
        &self.state
    }

    pub fn planner(&self) -> &BuildPlanner {
        &self.planner
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<FrozenState>> {
        self.published.subscribe()
    }

    /// Classify the request's paths and plan against the current state.
    ///
    /// A cold state or an escalated plan is re-detected with a full scan so
    /// the commit sees every tracked file.
    pub fn decide(&self, request: &BuildRequest) -> Decision {
        let layout = self.planner.layout();
        let mut classifications = if request.incremental && !self.cold {
            let paths = request
                .changed_paths
                .iter()
                .filter(|p| !layout.is_excluded(p))
                .cloned();
            // Directory paths expand to their files; re-check excludes.
            self.detector
                .classify(&self.state.records, paths)
                .into_iter()
                .filter(|c| !layout.is_excluded(&c.path))
                .collect()
        } else {
            self.scan()
        };

        let plan = self
            .planner
            .plan(request, &classifications, &self.state.plan_context(self.cold));

        if plan.is_full() && request.incremental && !self.cold {
            classifications = self.scan();
        }

        Decision {
            request: request.clone(),
            classifications,
            plan,
        }
    }

    /// Startup reconciliation: scan everything and plan the offline changes.
    pub fn reconcile(&self, full: bool, scope: Option<VersionScope>) -> Decision {
        let classifications = self.scan();
        let request = if full {
            BuildRequest::full()
        } else {
            BuildRequest::incremental(
                classifications
                    .iter()
                    .filter(|c| c.is_change())
                    .map(|c| c.path.clone()),
            )
        }
        .with_scope(scope);

        let plan = self
            .planner
            .plan(&request, &classifications, &self.state.plan_context(self.cold));
        Decision {
            request,
            classifications,
            plan,
        }
    }

    fn scan(&self) -> Vec<Classification> {
        let layout = self.planner.layout();
        self.detector.scan(&self.state.records, |rel| {
            layout.classify(rel) != PathClass::Ignored
        })
    }

    /// Pages and assets handed to the executor on a full rebuild.
    fn all_units(&self, classifications: &[Classification]) -> Vec<String> {
        let layout = self.planner.layout();
        classifications
            .iter()
            .filter(|c| c.record.is_some())
            .filter(|c| matches!(layout.classify(&c.path), PathClass::Content(_) | PathClass::Asset))
            .map(|c| c.path.clone())
            .collect()
    }

    /// Run `decision` through `executor`, then commit and flush.
    ///
    /// If the executor fails nothing is committed and the snapshot on disk
    /// stays as it was.
    pub async fn execute(&mut self, decision: Decision, executor: &dyn BuildExecutor) -> Result<BuildStats> {
        let started = Instant::now();
        let plan = &decision.plan;

        let outcome = if plan.is_empty() {
            debug!(deferred = plan.deferred.len(), "nothing to execute; committing state only");
            BuildOutcome::default()
        } else {
            let units = if plan.is_full() {
                self.all_units(&decision.classifications)
            } else {
                Vec::new()
            };
            executor.execute(plan, &units).await?
        };

        let mut stats = self.commit(&decision, &outcome);
        if !stats.stale_listings.is_empty() {
            self.refresh_listings(&decision, &mut stats, executor).await;
        }
        let cycles = self.state.graph.cycles();
        if !cycles.is_empty() {
            debug!(?cycles, "units depend on each other in a cycle");
        }
        self.flush()?;
        stats.elapsed = started.elapsed();
        self.generation += 1;
        info!(generation = self.generation, %stats, "build committed");
        self.publish(Some(stats.clone()));
        Ok(stats)
    }

    /// Render term listings whose membership changed in this build but that
    /// were not part of it. Listings outside a scoped request, or whose pass
    /// fails, stay pending for the next build.
    async fn refresh_listings(&mut self, decision: &Decision, stats: &mut BuildStats, executor: &dyn BuildExecutor) {
        let scope = decision.request.scope.as_ref();
        let (rebuild, out_of_scope): (BTreeSet<String>, BTreeSet<String>) =
            std::mem::take(&mut stats.stale_listings)
                .into_iter()
                .partition(|term| match (scope, self.state.graph.node(term)) {
                    (Some(scope), Some(node)) => &node.scope == scope,
                    _ => true,
                });
        stats.stale_listings = out_of_scope;
        if rebuild.is_empty() {
            return;
        }

        let plan = BuildPlan {
            rebuild,
            ..BuildPlan::default()
        };
        debug!(listings = ?plan.rebuild, "refreshing taxonomy listings");
        let outcome = match executor.execute(&plan, &[]).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, "listing refresh failed; listings stay pending");
                stats.stale_listings.extend(plan.rebuild);
                return;
            }
        };

        let follow_up = Decision {
            request: decision.request.clone(),
            classifications: Vec::new(),
            plan,
        };
        let extra = self.commit(&follow_up, &outcome);
        stats.rebuilt += extra.rebuilt;
        stats.failed += extra.failed;
        stats.orphaned_outputs.extend(extra.orphaned_outputs);
        stats.stale_listings.extend(extra.stale_listings);
    }

    /// Fold `outcome` into the in-memory state.
    ///
    /// A flush failure after this point is fatal for the caller; the files
    /// on disk still hold the previous snapshot.
    fn commit(&mut self, decision: &Decision, outcome: &BuildOutcome) -> BuildStats {
        let fs = &self.fs;
        let root = &self.root;
        self.state.apply(
            decision,
            &outcome.reports,
            self.planner.layout(),
            |rel| fs.exists(&root.join(rel)),
        )
    }

    /// Persist the state.
    pub fn flush(&mut self) -> Result<()> {
        self.state.flush(&self.store)?;
        self.cold = false;
        Ok(())
    }

    fn publish(&self, last_build: Option<BuildStats>) {
        let frozen = FrozenState {
            generation: self.generation,
            graph: self.state.graph.clone(),
            pages: self.state.pages.clone(),
            taxonomy: self.state.taxonomy.clone(),
            asset_deps: self.state.asset_deps.clone(),
            last_build,
        };
        self.published.send_replace(Arc::new(frozen));
    }
}
