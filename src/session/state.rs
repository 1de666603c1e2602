// src/session/state.rs

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::{
    CacheError, CacheStore, ColdStartReason, ASSET_DEPS, BUILD_CACHE, PAGE_METADATA,
    TAXONOMY_INDEX,
};
use crate::detect::{ChangeKind, FileRecord};
use crate::graph::{
    AssetDeps, DependencyGraph, PageIndex, PageRecord, TaxonomyIndex, TermDelta, UnitReport,
};
use crate::layout::{PathClass, SiteLayout};
use crate::planner::{BuildStats, PlanContext};
use crate::session::Decision;
use crate::types::{DependencyKind, VersionScope};

/// Persisted form of `build-cache`.
#[derive(Debug, Default, Deserialize)]
struct BuildCacheSnapshot {
    #[serde(default)]
    files: Vec<FileRecord>,
    #[serde(default)]
    graph: DependencyGraph,
    #[serde(default)]
    pending: BTreeSet<String>,
}

#[derive(Serialize)]
struct BuildCacheRef<'a> {
    files: Vec<&'a FileRecord>,
    graph: &'a DependencyGraph,
    pending: &'a BTreeSet<String>,
}

/// Everything the engine remembers between builds.
#[derive(Debug, Clone, Default)]
pub struct SiteState {
    pub records: HashMap<String, FileRecord>,
    pub graph: DependencyGraph,
    pub asset_deps: AssetDeps,
    pub pages: PageIndex,
    pub taxonomy: TaxonomyIndex,
    /// Units that still owe a rebuild (deferred by scope or failed).
    pub pending: BTreeSet<String>,
}

impl SiteState {
    /// Load every named snapshot. Returns the cold-start reasons per index;
    /// an empty list means the state is warm. Snapshots that exist but can't
    /// be used are deleted.
    pub fn load(store: &CacheStore) -> Result<(Self, Vec<(&'static str, ColdStartReason)>), CacheError> {
        let mut cold = Vec::new();

        let (build, reason) = store.load::<BuildCacheSnapshot>(BUILD_CACHE)?.into_parts();
        cold.extend(reason.map(|r| (BUILD_CACHE, r)));
        let (asset_deps, reason) = store.load::<AssetDeps>(ASSET_DEPS)?.into_parts();
        cold.extend(reason.map(|r| (ASSET_DEPS, r)));
        let (pages, reason) = store.load::<PageIndex>(PAGE_METADATA)?.into_parts();
        cold.extend(reason.map(|r| (PAGE_METADATA, r)));
        let (taxonomy, reason) = store.load::<TaxonomyIndex>(TAXONOMY_INDEX)?.into_parts();
        cold.extend(reason.map(|r| (TAXONOMY_INDEX, r)));

        let records = build
            .files
            .into_iter()
            .map(|r| (r.path.clone(), r))
            .collect();

        // Unusable files would otherwise be read again if we stop before
        // the next flush.
        for (name, reason) in &cold {
            if *reason != ColdStartReason::Missing {
                debug!(index = %name, %reason, "discarding unusable snapshot");
                store.invalidate(name)?;
            }
        }

        let state = Self {
            records,
            graph: build.graph,
            asset_deps,
            pages,
            taxonomy,
            pending: build.pending,
        };
        Ok((state, cold))
    }

    /// Write every named snapshot. Each file is replaced atomically.
    pub fn flush(&self, store: &CacheStore) -> Result<(), CacheError> {
        let mut files: Vec<&FileRecord> = self.records.values().collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        store.save(
            BUILD_CACHE,
            &BuildCacheRef {
                files,
                graph: &self.graph,
                pending: &self.pending,
            },
        )?;
        store.save(ASSET_DEPS, &self.asset_deps)?;
        store.save(PAGE_METADATA, &self.pages)?;
        store.save(TAXONOMY_INDEX, &self.taxonomy)
    }

    pub fn plan_context(&self, cold: bool) -> PlanContext<'_> {
        PlanContext {
            graph: &self.graph,
            records: &self.records,
            asset_deps: &self.asset_deps,
            pages: &self.pages,
            pending: &self.pending,
            cold,
        }
    }

    /// Fold a finished build into the state.
    ///
    /// `still_exists` re-checks a root-relative path on disk; deletions are
    /// only committed if the path is still gone.
    pub fn apply(
        &mut self,
        decision: &Decision,
        reports: &[UnitReport],
        layout: &SiteLayout,
        still_exists: impl Fn(&str) -> bool,
    ) -> BuildStats {
        let plan = &decision.plan;
        if plan.is_full() {
            debug!("resetting indexes for full rebuild");
            *self = SiteState::default();
        }

        let failed: BTreeSet<&str> = reports
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.unit.as_str())
            .collect();

        for change in &decision.classifications {
            match change.kind {
                ChangeKind::Deleted => {
                    if !still_exists(&change.path) {
                        self.records.remove(&change.path);
                    }
                }
                ChangeKind::Unreadable => {}
                _ => {
                    // A failed unit keeps its previous record so the change
                    // is still visible to the next scan.
                    if let Some(record) = &change.record {
                        if !failed.contains(change.path.as_str()) {
                            self.records.insert(change.path.clone(), record.clone());
                        }
                    }
                }
            }
        }

        let built: BTreeSet<&str> = reports
            .iter()
            .filter(|r| r.success)
            .map(|r| r.unit.as_str())
            .collect();
        let mut touched_terms = BTreeSet::new();

        for id in &plan.removed {
            if still_exists(id) {
                debug!(path = %id, "deleted path reappeared; keeping its entries");
                continue;
            }
            touched_terms.extend(self.remove_unit(id));
        }

        self.graph.commit_reports(reports);

        let mut stats = BuildStats {
            removed: plan.removed.len(),
            failed: failed.len(),
            full_rebuild: plan.is_full(),
            reason: plan.full_rebuild.clone(),
            elapsed: Duration::ZERO,
            orphaned_outputs: plan.orphaned_outputs.clone(),
            ..BuildStats::default()
        };

        for report in reports.iter().filter(|r| r.success) {
            if layout.classify(&report.unit) == PathClass::Asset {
                self.asset_deps.set_imports(&report.unit, &report.imports);
                stats.assets += 1;
            } else {
                touched_terms.extend(self.record_page(report));
                stats.rebuilt += 1;
            }
            self.pending.remove(&report.unit);
        }

        // Term pages re-reported by the collaborator just had their edges
        // rebuilt from the report; membership comes from the index.
        for report in reports.iter().filter(|r| r.success && r.generated) {
            self.sync_term_edges(&report.unit);
        }

        // Emptied terms go only now, after their own reports were committed.
        for term in &touched_terms {
            if self.taxonomy.members(term).is_some() {
                continue;
            }
            if let Some(output) = self.drop_term(term) {
                stats.orphaned_outputs.insert(output);
            }
        }

        if !plan.is_full() {
            stats.stale_listings = touched_terms
                .into_iter()
                .filter(|t| self.taxonomy.members(t).is_some() && !built.contains(t.as_str()))
                .collect();
            self.pending.extend(stats.stale_listings.iter().cloned());
        }

        self.pending.extend(failed.iter().map(|s| s.to_string()));
        self.pending.extend(plan.deferred.iter().cloned());
        stats
    }

    /// Returns the term pages whose membership changed.
    fn record_page(&mut self, report: &UnitReport) -> Vec<String> {
        let output = report
            .output
            .clone()
            .or_else(|| self.pages.output_of(&report.unit).map(str::to_string))
            .unwrap_or_default();
        let mut record = PageRecord::new(&report.unit, output, report.scope.clone());
        record.title = report.title.clone();
        record.tags = report.terms.clone();
        record.generated = report.generated;
        self.pages.upsert(record);

        if report.generated {
            return Vec::new();
        }

        let delta = self
            .taxonomy
            .set_terms(&report.unit, &report.scope, &report.terms);
        self.apply_term_delta(&report.unit, &report.scope, &delta)
    }

    fn apply_term_delta(&mut self, page: &str, page_scope: &VersionScope, delta: &TermDelta) -> Vec<String> {
        let term_scope = term_scope(page_scope);
        for term in &delta.added {
            if !self.graph.contains_node(term) {
                self.graph.register_node(term, term_scope.clone(), true);
            }
            self.graph
                .record_edge(term, page, DependencyKind::TaxonomyMembership, term_scope.clone());
        }
        for term in &delta.removed {
            self.graph
                .remove_edge(term, page, DependencyKind::TaxonomyMembership);
        }
        delta
            .added
            .iter()
            .chain(&delta.removed)
            .chain(&delta.emptied)
            .cloned()
            .collect()
    }

    /// Forget a term page with no members left. Returns its output (or its
    /// id when no output was ever reported) for cleanup.
    fn drop_term(&mut self, term: &str) -> Option<String> {
        let known = self.graph.contains_node(term) || self.pages.contains(term);
        self.graph.remove_node(term);
        self.pending.remove(term);
        let output = self
            .pages
            .remove(term)
            .map(|r| r.output_path)
            .filter(|o| !o.is_empty());
        if !known {
            return None;
        }
        let output = output.unwrap_or_else(|| term.to_string());
        info!(term = %term, output = %output, "taxonomy term has no pages left");
        Some(output)
    }

    fn sync_term_edges(&mut self, term: &str) {
        let Some(members) = self.taxonomy.members(term) else {
            return;
        };
        let scope = self
            .graph
            .node(term)
            .map(|n| n.scope.clone())
            .unwrap_or_default();
        let members: Vec<String> = members.iter().cloned().collect();
        for member in members {
            self.graph
                .record_edge(term, &member, DependencyKind::TaxonomyMembership, scope.clone());
        }
    }

    /// Returns the term pages whose membership changed.
    fn remove_unit(&mut self, id: &str) -> Vec<String> {
        self.graph.remove_node(id);
        let scope = self
            .pages
            .get(id)
            .map(|r| r.scope.clone())
            .unwrap_or_default();
        let delta = self.taxonomy.remove_page(id);
        let touched = self.apply_term_delta(id, &scope, &delta);
        self.pages.remove(id);
        self.asset_deps.remove_asset(id);
        self.pending.remove(id);
        touched
    }
}

/// Shared pages list under the latest taxonomy.
fn term_scope(page_scope: &VersionScope) -> VersionScope {
    if page_scope.is_shared() {
        VersionScope::Latest
    } else {
        page_scope.clone()
    }
}
