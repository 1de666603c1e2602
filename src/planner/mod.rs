// src/planner/mod.rs

//! Turns classified changes into a [`BuildPlan`].
//!
//! The planner is pure: it reads the graph and indexes through a
//! [`PlanContext`] and never mutates them. Whenever the minimal set can't be
//! computed with certainty it returns a full-rebuild plan with a reason.

mod plan;

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{debug, info};

use crate::config::ConfigFile;
use crate::detect::{ChangeKind, Classification, FileRecord};
use crate::graph::{AssetDeps, DependencyGraph, PageIndex};
use crate::layout::{PathClass, SiteLayout};
use crate::types::{TemplatePolicy, VersionScope};

pub use plan::{BuildPlan, BuildRequest, BuildStats, FullRebuildReason};

/// Read-only view of the persisted state the planner decides against.
#[derive(Debug, Clone, Copy)]
pub struct PlanContext<'a> {
    pub graph: &'a DependencyGraph,
    pub records: &'a HashMap<String, FileRecord>,
    pub asset_deps: &'a AssetDeps,
    pub pages: &'a PageIndex,
    /// Units deferred by an earlier scoped build.
    pub pending: &'a BTreeSet<String>,
    /// True if any persisted index was a cold start.
    pub cold: bool,
}

#[derive(Debug, Clone)]
pub struct BuildPlanner {
    layout: SiteLayout,
    policy: TemplatePolicy,
    max_depth: usize,
}

/// Consumers reached from one producer, kept for the resolvability check.
struct Cascade {
    producer: String,
    consumers: BTreeSet<String>,
}

impl BuildPlanner {
    pub fn new(layout: SiteLayout, policy: TemplatePolicy, max_depth: usize) -> Self {
        Self {
            layout,
            policy,
            max_depth,
        }
    }

    pub fn from_config(cfg: &ConfigFile) -> anyhow::Result<Self> {
        let layout = SiteLayout::from_section(cfg.layout())?;
        Ok(Self::new(
            layout,
            cfg.engine().template_policy,
            cfg.engine().max_depth,
        ))
    }

    pub fn layout(&self) -> &SiteLayout {
        &self.layout
    }

    pub fn plan(&self, request: &BuildRequest, changes: &[Classification], ctx: &PlanContext<'_>) -> BuildPlan {
        match self.try_plan(request, changes, ctx) {
            Ok(plan) => {
                debug!(
                    rebuild = plan.rebuild.len(),
                    assets = plan.assets.len(),
                    removed = plan.removed.len(),
                    deferred = plan.deferred.len(),
                    "incremental plan ready"
                );
                plan
            }
            Err(reason) => {
                info!(reason = %reason, "planning a full rebuild");
                BuildPlan::full(reason)
            }
        }
    }

    fn try_plan(
        &self,
        request: &BuildRequest,
        changes: &[Classification],
        ctx: &PlanContext<'_>,
    ) -> Result<BuildPlan, FullRebuildReason> {
        if !request.incremental {
            return Err(FullRebuildReason::Requested);
        }
        if ctx.cold {
            return Err(FullRebuildReason::ColdCache);
        }

        let changes: Vec<(&Classification, PathClass)> = changes
            .iter()
            .filter(|c| c.is_change())
            .map(|c| (c, self.layout.classify(&c.path)))
            .filter(|(c, class)| {
                let keep = *class != PathClass::Ignored;
                if !keep {
                    debug!(path = %c.path, "change outside the site layout");
                }
                keep
            })
            .collect();

        self.check_escalations(&changes)?;

        let added: HashSet<&str> = changes
            .iter()
            .filter(|(c, _)| c.kind == ChangeKind::Added)
            .map(|(c, _)| c.path.as_str())
            .collect();

        let mut plan = BuildPlan::default();
        let mut cascades = Vec::new();

        for (change, class) in &changes {
            let path = change.path.as_str();
            match (class, change.kind) {
                (PathClass::Content(_), ChangeKind::Added) => {
                    plan.rebuild.insert(path.to_string());
                }
                (PathClass::Asset, ChangeKind::Added) => {
                    plan.assets.insert(path.to_string());
                }
                (PathClass::Content(scope), ChangeKind::Modified) => {
                    plan.rebuild.insert(path.to_string());
                    cascades.push(self.cascade(path, scope, ctx, &mut plan)?);
                }
                (PathClass::Template, ChangeKind::Modified) => {
                    cascades.push(self.cascade(path, &VersionScope::Shared, ctx, &mut plan)?);
                }
                (PathClass::Asset, ChangeKind::Modified) => {
                    plan.assets.insert(path.to_string());
                    cascades.extend(self.asset_cascade(path, ctx, &mut plan)?);
                }
                (_, ChangeKind::Deleted) => {
                    self.check_fallback(path, ctx.graph)?;
                    plan.removed.insert(path.to_string());
                    if let Some(output) = ctx.pages.output_of(path) {
                        plan.orphaned_outputs.insert(output.to_string());
                    }
                    if *class == PathClass::Asset {
                        cascades.extend(self.asset_cascade(path, ctx, &mut plan)?);
                    } else {
                        let scope = class.producer_scope().unwrap_or_default();
                        cascades.push(self.cascade(path, &scope, ctx, &mut plan)?);
                    }
                }
                _ => {}
            }
        }

        let removed = plan.removed.clone();
        plan.rebuild.retain(|id| !removed.contains(id));
        plan.assets.retain(|id| !removed.contains(id));

        let resolves = |id: &str| {
            ctx.records.contains_key(id)
                || added.contains(id)
                || ctx.graph.node(id).is_some_and(|n| n.generated)
        };

        for cascade in &cascades {
            for consumer in &cascade.consumers {
                if removed.contains(consumer) {
                    continue;
                }
                if !resolves(consumer) {
                    return Err(FullRebuildReason::UnresolvedDependent {
                        producer: cascade.producer.clone(),
                        consumer: consumer.clone(),
                    });
                }
            }
        }

        for id in ctx.pending {
            if !removed.contains(id) && resolves(id) {
                plan.rebuild.insert(id.clone());
            }
        }

        if let Some(scope) = &request.scope {
            let (keep, defer): (BTreeSet<String>, BTreeSet<String>) =
                std::mem::take(&mut plan.rebuild).into_iter().partition(|id| {
                    let unit_scope = self.unit_scope(id, ctx.graph);
                    &unit_scope == scope || unit_scope.is_shared()
                });
            plan.rebuild = keep;
            plan.deferred = defer;
        }

        Ok(plan)
    }

    fn check_escalations(&self, changes: &[(&Classification, PathClass)]) -> Result<(), FullRebuildReason> {
        for (change, class) in changes {
            let path = change.path.clone();
            if change.kind == ChangeKind::Unreadable {
                return Err(FullRebuildReason::Unreadable { path });
            }
            match class {
                PathClass::Structural => return Err(FullRebuildReason::Structural { path }),
                PathClass::Template if self.policy == TemplatePolicy::FullRebuild => {
                    return Err(FullRebuildReason::TemplatePolicy { path });
                }
                PathClass::Template if change.kind == ChangeKind::Added => {
                    return Err(FullRebuildReason::TemplateAdded { path });
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// A deleted producer consumed through a fallback-capable edge leaves the
    /// consumer's next resource unknown.
    fn check_fallback(&self, path: &str, graph: &DependencyGraph) -> Result<(), FullRebuildReason> {
        match graph.edges_to(path).into_iter().find(|e| e.kind.has_fallback()) {
            Some(edge) => Err(FullRebuildReason::AmbiguousDeletion {
                producer: path.to_string(),
                consumer: edge.consumer,
            }),
            None => Ok(()),
        }
    }

    fn cascade(
        &self,
        producer: &str,
        scope: &VersionScope,
        ctx: &PlanContext<'_>,
        plan: &mut BuildPlan,
    ) -> Result<Cascade, FullRebuildReason> {
        let consumers = ctx
            .graph
            .transitive_dependents_of(producer, scope, self.max_depth)?;
        plan.rebuild.extend(consumers.iter().cloned());
        Ok(Cascade {
            producer: producer.to_string(),
            consumers,
        })
    }

    /// Bundles importing `asset` are reprocessed; pages referencing the asset
    /// or any of those bundles are rebuilt.
    fn asset_cascade(
        &self,
        asset: &str,
        ctx: &PlanContext<'_>,
        plan: &mut BuildPlan,
    ) -> Result<Vec<Cascade>, FullRebuildReason> {
        let importers = ctx.asset_deps.transitive_importers(asset, self.max_depth)?;
        plan.assets.extend(importers.iter().cloned());

        let mut cascades = vec![Cascade {
            producer: asset.to_string(),
            consumers: importers.clone(),
        }];
        for producer in std::iter::once(asset.to_string()).chain(importers) {
            cascades.push(self.cascade(&producer, &VersionScope::Shared, ctx, plan)?);
        }
        Ok(cascades)
    }

    fn unit_scope(&self, id: &str, graph: &DependencyGraph) -> VersionScope {
        if let Some(node) = graph.node(id) {
            return node.scope.clone();
        }
        match self.layout.classify(id) {
            PathClass::Content(scope) => scope,
            PathClass::Asset | PathClass::Template => VersionScope::Shared,
            _ => VersionScope::Latest,
        }
    }
}

#[cfg(test)]
mod tests;
