// src/planner/tests.rs

use std::collections::{BTreeSet, HashMap};

use super::*;
use crate::config::LayoutSection;
use crate::graph::PageRecord;
use crate::types::DependencyKind;

fn v(name: &str) -> VersionScope {
    VersionScope::Version(name.to_string())
}

fn set(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

struct Fixture {
    planner: BuildPlanner,
    graph: DependencyGraph,
    records: HashMap<String, FileRecord>,
    asset_deps: AssetDeps,
    pages: PageIndex,
    pending: BTreeSet<String>,
    cold: bool,
}

impl Fixture {
    fn new(policy: TemplatePolicy) -> Self {
        let layout = SiteLayout::from_section(&LayoutSection::default()).unwrap();
        Self {
            planner: BuildPlanner::new(layout, policy, 16),
            graph: DependencyGraph::new(),
            records: HashMap::new(),
            asset_deps: AssetDeps::new(),
            pages: PageIndex::new(),
            pending: BTreeSet::new(),
            cold: false,
        }
    }

    fn track(&mut self, paths: &[&str]) {
        for path in paths {
            self.records.insert(
                path.to_string(),
                FileRecord {
                    path: path.to_string(),
                    fingerprint: "0".repeat(64),
                    size: 1,
                    modified_ms: 1,
                },
            );
        }
    }

    fn page(&mut self, path: &str, scope: VersionScope) {
        self.track(&[path]);
        self.graph.register_node(path, scope.clone(), false);
        let output = path.replace("content/", "public/").replace(".md", ".html");
        self.pages.upsert(PageRecord::new(path, output, scope));
    }

    fn edge(&mut self, consumer: &str, producer: &str, kind: DependencyKind) {
        let scope = self
            .graph
            .node(consumer)
            .map(|n| n.scope.clone())
            .unwrap_or_default();
        self.graph.record_edge(consumer, producer, kind, scope);
    }

    fn plan_request(&self, request: &BuildRequest, changes: &[(&str, ChangeKind)]) -> BuildPlan {
        let changes: Vec<Classification> = changes
            .iter()
            .map(|(p, k)| Classification::new(*p, *k))
            .collect();
        let ctx = PlanContext {
            graph: &self.graph,
            records: &self.records,
            asset_deps: &self.asset_deps,
            pages: &self.pages,
            pending: &self.pending,
            cold: self.cold,
        };
        self.planner.plan(request, &changes, &ctx)
    }

    fn plan(&self, changes: &[(&str, ChangeKind)]) -> BuildPlan {
        let paths = changes.iter().map(|(p, _)| *p);
        self.plan_request(&BuildRequest::incremental(paths), changes)
    }
}

/// Five latest pages, three of which render through `templates/base.html`.
fn base_template_site(policy: TemplatePolicy) -> Fixture {
    let mut f = Fixture::new(policy);
    f.track(&["templates/base.html", "templates/plain.html"]);
    for name in ["a", "b", "c", "d", "e"] {
        f.page(&format!("content/{name}.md"), VersionScope::Latest);
    }
    for name in ["a", "b", "c"] {
        f.edge(&format!("content/{name}.md"), "templates/base.html", DependencyKind::Template);
    }
    for name in ["d", "e"] {
        f.edge(&format!("content/{name}.md"), "templates/plain.html", DependencyKind::Template);
    }
    f
}

#[test]
fn template_change_rebuilds_only_its_pages_under_cascade_policy() {
    let f = base_template_site(TemplatePolicy::Cascade);
    let plan = f.plan(&[("templates/base.html", ChangeKind::Modified)]);

    assert!(!plan.is_full());
    assert_eq!(plan.rebuild, set(&["content/a.md", "content/b.md", "content/c.md"]));
}

#[test]
fn template_change_is_full_rebuild_under_full_policy() {
    let f = base_template_site(TemplatePolicy::FullRebuild);
    let plan = f.plan(&[("templates/base.html", ChangeKind::Modified)]);

    assert_eq!(
        plan.full_rebuild,
        Some(FullRebuildReason::TemplatePolicy {
            path: "templates/base.html".into()
        })
    );
}

#[test]
fn partial_change_reaches_pages_through_template() {
    let mut f = base_template_site(TemplatePolicy::Cascade);
    f.track(&["templates/nav.html"]);
    f.graph
        .register_node("templates/base.html", VersionScope::Shared, false);
    f.edge("templates/base.html", "templates/nav.html", DependencyKind::Partial);

    let plan = f.plan(&[("templates/nav.html", ChangeKind::Modified)]);
    assert_eq!(
        plan.rebuild,
        set(&["content/a.md", "content/b.md", "content/c.md", "templates/base.html"])
    );
}

#[test]
fn shared_content_cascades_into_every_version() {
    let mut f = Fixture::new(TemplatePolicy::Cascade);
    f.track(&["content/_shared/snippet.md"]);
    f.page("content/guide.md", VersionScope::Latest);
    f.page("content/versions/v1/guide.md", v("v1"));
    f.page("content/versions/v2/guide.md", v("v2"));
    for page in ["content/guide.md", "content/versions/v1/guide.md", "content/versions/v2/guide.md"] {
        f.edge(page, "content/_shared/snippet.md", DependencyKind::SharedContent);
    }

    let plan = f.plan(&[("content/_shared/snippet.md", ChangeKind::Modified)]);
    assert!(plan.rebuild.contains("content/guide.md"));
    assert!(plan.rebuild.contains("content/versions/v1/guide.md"));
    assert!(plan.rebuild.contains("content/versions/v2/guide.md"));
}

#[test]
fn versioned_change_stays_in_its_version() {
    let mut f = Fixture::new(TemplatePolicy::Cascade);
    f.page("content/versions/v1/api.md", v("v1"));
    f.page("content/versions/v1/index.md", v("v1"));
    f.page("content/versions/v2/index.md", v("v2"));
    f.page("content/index.md", VersionScope::Latest);
    // Stale edges from other versions must not be followed.
    f.edge("content/versions/v1/index.md", "content/versions/v1/api.md", DependencyKind::SharedContent);
    f.edge("content/versions/v2/index.md", "content/versions/v1/api.md", DependencyKind::SharedContent);
    f.edge("content/index.md", "content/versions/v1/api.md", DependencyKind::SharedContent);

    let plan = f.plan(&[("content/versions/v1/api.md", ChangeKind::Modified)]);
    assert_eq!(
        plan.rebuild,
        set(&["content/versions/v1/api.md", "content/versions/v1/index.md"])
    );
}

#[test]
fn cross_version_link_cascades_across_versions() {
    let mut f = Fixture::new(TemplatePolicy::Cascade);
    f.page("content/migrate.md", VersionScope::Latest);
    f.page("content/versions/v1/install.md", v("v1"));
    f.edge("content/migrate.md", "content/versions/v1/install.md", DependencyKind::CrossVersionLink);

    let plan = f.plan(&[("content/versions/v1/install.md", ChangeKind::Modified)]);
    assert!(plan.rebuild.contains("content/migrate.md"));
}

#[test]
fn unchanged_and_ignored_paths_plan_nothing() {
    let mut f = base_template_site(TemplatePolicy::Cascade);
    assert!(f.plan(&[]).is_empty());
    assert!(f.plan(&[("content/a.md", ChangeKind::Unchanged)]).is_empty());
    assert!(f.plan(&[("README.md", ChangeKind::Modified)]).is_empty());

    f.cold = true;
    assert_eq!(f.plan(&[]).full_rebuild, Some(FullRebuildReason::ColdCache));
}

#[test]
fn escalations_for_unreadable_structural_and_requested() {
    let f = base_template_site(TemplatePolicy::Cascade);
    assert!(matches!(
        f.plan(&[("content/a.md", ChangeKind::Unreadable)]).full_rebuild,
        Some(FullRebuildReason::Unreadable { .. })
    ));
    assert!(matches!(
        f.plan(&[("directives/callout.toml", ChangeKind::Modified)]).full_rebuild,
        Some(FullRebuildReason::Structural { .. })
    ));
    assert_eq!(
        f.plan_request(&BuildRequest::full(), &[]).full_rebuild,
        Some(FullRebuildReason::Requested)
    );
}

#[test]
fn deleting_shared_changelog_rebuilds_includers_and_orphans_output() {
    let mut f = Fixture::new(TemplatePolicy::Cascade);
    f.page("content/_shared/changelog.md", VersionScope::Shared);
    f.page("content/releases.md", VersionScope::Latest);
    f.page("content/versions/v1/releases.md", v("v1"));
    f.edge("content/releases.md", "content/_shared/changelog.md", DependencyKind::SharedContent);
    f.edge("content/versions/v1/releases.md", "content/_shared/changelog.md", DependencyKind::SharedContent);

    let plan = f.plan(&[("content/_shared/changelog.md", ChangeKind::Deleted)]);
    assert!(!plan.is_full());
    assert_eq!(plan.removed, set(&["content/_shared/changelog.md"]));
    assert_eq!(plan.orphaned_outputs, set(&["public/_shared/changelog.html"]));
    assert_eq!(
        plan.rebuild,
        set(&["content/releases.md", "content/versions/v1/releases.md"])
    );
}

#[test]
fn deleting_a_partial_with_dependents_is_ambiguous() {
    let mut f = base_template_site(TemplatePolicy::Cascade);
    let plan = f.plan(&[("templates/plain.html", ChangeKind::Deleted)]);
    assert!(matches!(
        plan.full_rebuild,
        Some(FullRebuildReason::AmbiguousDeletion { .. })
    ));

    // Nothing depends on it anymore: plain removal.
    f.graph.remove_producer("templates/plain.html");
    let plan = f.plan(&[("templates/plain.html", ChangeKind::Deleted)]);
    assert!(!plan.is_full());
    assert!(plan.rebuild.is_empty());
}

#[test]
fn dependent_without_source_escalates() {
    let mut f = Fixture::new(TemplatePolicy::Cascade);
    f.page("content/a.md", VersionScope::Latest);
    f.graph
        .record_edge("content/ghost.md", "content/a.md", DependencyKind::SharedContent, VersionScope::Latest);

    let plan = f.plan(&[("content/a.md", ChangeKind::Modified)]);
    assert_eq!(
        plan.full_rebuild,
        Some(FullRebuildReason::UnresolvedDependent {
            producer: "content/a.md".into(),
            consumer: "content/ghost.md".into()
        })
    );
}

#[test]
fn deep_chain_escalates_past_depth_bound() {
    let mut f = Fixture::new(TemplatePolicy::Cascade);
    f.planner = BuildPlanner::new(f.planner.layout().clone(), TemplatePolicy::Cascade, 2);
    for name in ["a", "b", "c", "d"] {
        f.page(&format!("content/{name}.md"), VersionScope::Latest);
    }
    f.edge("content/b.md", "content/a.md", DependencyKind::SharedContent);
    f.edge("content/c.md", "content/b.md", DependencyKind::SharedContent);
    f.edge("content/d.md", "content/c.md", DependencyKind::SharedContent);

    let plan = f.plan(&[("content/a.md", ChangeKind::Modified)]);
    assert!(matches!(
        plan.full_rebuild,
        Some(FullRebuildReason::DepthExceeded { max_depth: 2, .. })
    ));
}

#[test]
fn added_page_does_not_cascade() {
    let mut f = Fixture::new(TemplatePolicy::Cascade);
    f.page("content/index.md", VersionScope::Latest);
    // Index linked to the page before it existed.
    f.edge("content/index.md", "content/new.md", DependencyKind::SharedContent);

    let plan = f.plan(&[("content/new.md", ChangeKind::Added)]);
    assert_eq!(plan.rebuild, set(&["content/new.md"]));
}

#[test]
fn asset_change_reprocesses_bundles_and_referencing_pages() {
    let mut f = Fixture::new(TemplatePolicy::Cascade);
    f.track(&["assets/_vars.css", "assets/app.css", "assets/print.css"]);
    f.asset_deps.set_imports("assets/app.css", &["assets/_vars.css"]);
    f.page("content/a.md", VersionScope::Latest);
    f.page("content/b.md", VersionScope::Latest);
    f.edge("content/a.md", "assets/app.css", DependencyKind::AssetReference);
    f.edge("content/b.md", "assets/print.css", DependencyKind::AssetReference);

    let plan = f.plan(&[("assets/_vars.css", ChangeKind::Modified)]);
    assert_eq!(plan.assets, set(&["assets/_vars.css", "assets/app.css"]));
    assert_eq!(plan.rebuild, set(&["content/a.md"]));
}

#[test]
fn taxonomy_listing_follows_member_page() {
    let mut f = Fixture::new(TemplatePolicy::Cascade);
    f.page("content/a.md", VersionScope::Latest);
    f.graph.register_node("taxonomy/rust", VersionScope::Latest, true);
    f.edge("taxonomy/rust", "content/a.md", DependencyKind::TaxonomyMembership);

    let plan = f.plan(&[("content/a.md", ChangeKind::Modified)]);
    assert_eq!(plan.rebuild, set(&["content/a.md", "taxonomy/rust"]));
}

#[test]
fn scoped_request_defers_other_versions_and_picks_them_up_later() {
    let mut f = Fixture::new(TemplatePolicy::Cascade);
    f.track(&["content/_shared/snippet.md"]);
    f.page("content/guide.md", VersionScope::Latest);
    f.page("content/versions/v2/guide.md", v("v2"));
    f.edge("content/guide.md", "content/_shared/snippet.md", DependencyKind::SharedContent);
    f.edge("content/versions/v2/guide.md", "content/_shared/snippet.md", DependencyKind::SharedContent);

    let request = BuildRequest::incremental(["content/_shared/snippet.md"]).with_scope(Some(v("v2")));
    let plan = f.plan_request(&request, &[("content/_shared/snippet.md", ChangeKind::Modified)]);
    assert_eq!(plan.rebuild, set(&["content/versions/v2/guide.md"]));
    assert_eq!(plan.deferred, set(&["content/guide.md"]));

    f.pending = plan.deferred;
    let plan = f.plan(&[]);
    assert_eq!(plan.rebuild, set(&["content/guide.md"]));
}
