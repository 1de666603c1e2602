// tests/session_builds.rs

mod common;
use crate::common::{default_config, docs_executor, init_tracing, open_session};

use std::collections::BTreeSet;
use std::error::Error;

use sitegraph::cache::{CacheStore, BUILD_CACHE};
use sitegraph::graph::UnitReport;
use sitegraph::planner::{BuildRequest, FullRebuildReason};
use sitegraph::types::VersionScope;
use sitegraph_test_utils::builders::SiteTree;

type TestResult = Result<(), Box<dyn Error>>;

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn cold_start_builds_every_unit_then_goes_incremental() -> TestResult {
    init_tracing();
    let site = SiteTree::docs_site();
    let cfg = default_config();
    let exec = docs_executor(&cfg);

    let mut session = open_session(&site, &cfg);
    assert!(session.is_cold());

    let decision = session.reconcile(false, None);
    assert_eq!(decision.plan.full_rebuild, Some(FullRebuildReason::ColdCache));

    let stats = session.execute(decision, &exec).await?;
    assert!(stats.full_rebuild);
    assert!(!session.is_cold());

    let built = exec.last().expect("one build").units;
    assert_eq!(
        built,
        set(&[
            "assets/site.css",
            "content/_shared/changelog.md",
            "content/guide.md",
            "content/index.md",
            "content/versions/v2/guide.md",
        ])
    );

    // base.html is used by every page in every scope.
    site.write("templates/base.html", "<html><main>{{ content }}</main></html>");
    let decision = session.decide(&BuildRequest::incremental(["templates/base.html"]));
    assert!(!decision.plan.is_full());
    assert_eq!(
        decision.plan.rebuild,
        set(&["content/guide.md", "content/index.md", "content/versions/v2/guide.md"])
    );
    session.execute(decision, &exec).await?;

    // A partial only reaches the page that included it.
    site.write("templates/partials/nav.html", "<nav class=\"top\"></nav>");
    let decision = session.decide(&BuildRequest::incremental(["templates/partials/nav.html"]));
    assert_eq!(decision.plan.rebuild, set(&["content/guide.md"]));
    Ok(())
}

#[tokio::test]
async fn snapshot_survives_restart_and_detects_offline_edits() -> TestResult {
    init_tracing();
    let site = SiteTree::docs_site();
    let cfg = default_config();
    let exec = docs_executor(&cfg);

    {
        let mut session = open_session(&site, &cfg);
        let decision = session.reconcile(false, None);
        session.execute(decision, &exec).await?;
    }

    // Nothing changed while we were down.
    let session = open_session(&site, &cfg);
    assert!(!session.is_cold());
    assert!(session.state().graph.has_dependents("templates/base.html"));
    assert!(!session.reconcile(false, None).has_work());
    drop(session);

    // The shared changelog is edited offline.
    site.write("content/_shared/changelog.md", "# Changes\n\n- 2.1 released");
    let session = open_session(&site, &cfg);
    let decision = session.reconcile(false, None);
    assert_eq!(
        decision.plan.rebuild,
        set(&["content/_shared/changelog.md", "content/index.md"])
    );
    Ok(())
}

#[tokio::test]
async fn corrupt_snapshot_forces_a_full_rebuild() -> TestResult {
    init_tracing();
    let site = SiteTree::docs_site();
    let cfg = default_config();
    let exec = docs_executor(&cfg);

    {
        let mut session = open_session(&site, &cfg);
        let decision = session.reconcile(false, None);
        session.execute(decision, &exec).await?;
    }

    let store = CacheStore::open(site.path(".sitegraph"))?;
    std::fs::write(store.compressed_path(BUILD_CACHE), b"not zstd at all")?;

    let session = open_session(&site, &cfg);
    assert!(session.is_cold());
    let decision = session.reconcile(false, None);
    assert_eq!(decision.plan.full_rebuild, Some(FullRebuildReason::ColdCache));
    Ok(())
}

#[tokio::test]
async fn executor_failure_leaves_state_untouched() -> TestResult {
    init_tracing();
    let site = SiteTree::docs_site();
    let cfg = default_config();
    let exec = docs_executor(&cfg);

    let mut session = open_session(&site, &cfg);
    let decision = session.reconcile(false, None);
    session.execute(decision, &exec).await?;

    site.write("content/guide.md", "# Guide\n\nrewritten");
    let decision = session.decide(&BuildRequest::incremental(["content/guide.md"]));
    exec.fail_next();
    assert!(session.execute(decision, &exec).await.is_err());

    // The change is still pending against the old record.
    let decision = session.decide(&BuildRequest::incremental(["content/guide.md"]));
    assert_eq!(decision.plan.rebuild, set(&["content/guide.md"]));
    Ok(())
}

#[tokio::test]
async fn failed_unit_is_retried_on_the_next_build() -> TestResult {
    init_tracing();
    let site = SiteTree::docs_site();
    let cfg = default_config();
    let exec = docs_executor(&cfg);

    let mut session = open_session(&site, &cfg);
    let decision = session.reconcile(false, None);
    session.execute(decision, &exec).await?;

    site.write("content/index.md", "# Home\n\nbroken directive");
    exec.set_report(UnitReport::failed("content/index.md", VersionScope::Latest));
    let decision = session.decide(&BuildRequest::incremental(["content/index.md"]));
    let stats = session.execute(decision, &exec).await?;
    assert_eq!(stats.failed, 1);
    assert!(session.state().pending.contains("content/index.md"));

    // An unrelated edit also picks up the failed page.
    exec.set_report(UnitReport::new("content/index.md", VersionScope::Latest));
    site.write("content/versions/v2/guide.md", "# Guide v2\n\nmore");
    let decision = session.decide(&BuildRequest::incremental(["content/versions/v2/guide.md"]));
    assert_eq!(
        decision.plan.rebuild,
        set(&["content/index.md", "content/versions/v2/guide.md"])
    );
    session.execute(decision, &exec).await?;
    assert!(session.state().pending.is_empty());
    Ok(())
}

#[tokio::test]
async fn deleted_page_is_removed_from_every_index() -> TestResult {
    init_tracing();
    let site = SiteTree::docs_site();
    let cfg = default_config();
    let exec = docs_executor(&cfg);

    let mut session = open_session(&site, &cfg);
    let decision = session.reconcile(false, None);
    session.execute(decision, &exec).await?;
    assert!(session.state().graph.contains_node("content/guide.md"));

    site.remove("content/guide.md");
    let decision = session.decide(&BuildRequest::incremental(["content/guide.md"]));
    assert_eq!(decision.plan.removed, set(&["content/guide.md"]));
    assert!(decision.plan.rebuild.is_empty());
    session.execute(decision, &exec).await?;

    let state = session.state();
    assert!(!state.records.contains_key("content/guide.md"));
    assert!(!state.graph.contains_node("content/guide.md"));
    assert!(!state.pages.contains("content/guide.md"));
    Ok(())
}

#[tokio::test]
async fn scoped_build_defers_other_versions() -> TestResult {
    init_tracing();
    let site = SiteTree::docs_site();
    let cfg = default_config();
    let exec = docs_executor(&cfg);

    let mut session = open_session(&site, &cfg);
    let decision = session.reconcile(false, None);
    session.execute(decision, &exec).await?;

    site.write("templates/base.html", "<html lang=\"en\">{{ content }}</html>");
    let request = BuildRequest::incremental(["templates/base.html"])
        .with_scope(Some(VersionScope::Version("v2".into())));
    let decision = session.decide(&request);
    assert_eq!(decision.plan.rebuild, set(&["content/versions/v2/guide.md"]));
    assert_eq!(
        decision.plan.deferred,
        set(&["content/guide.md", "content/index.md"])
    );
    session.execute(decision, &exec).await?;
    assert_eq!(
        exec.last().expect("scoped build").units,
        set(&["content/versions/v2/guide.md"])
    );

    // The deferred pages come back on the next unscoped build.
    let decision = session.decide(&BuildRequest::incremental(Vec::<String>::new()));
    assert_eq!(
        decision.plan.rebuild,
        set(&["content/guide.md", "content/index.md"])
    );
    Ok(())
}

#[tokio::test]
async fn commits_are_published_to_subscribers() -> TestResult {
    init_tracing();
    let site = SiteTree::docs_site();
    let cfg = default_config();
    let exec = docs_executor(&cfg);

    let mut session = open_session(&site, &cfg);
    let rx = session.subscribe();
    assert_eq!(rx.borrow().generation, 0);

    let decision = session.reconcile(false, None);
    session.execute(decision, &exec).await?;

    let frozen = rx.borrow().clone();
    assert_eq!(frozen.generation, 1);
    assert!(frozen.last_build.as_ref().is_some_and(|s| s.full_rebuild));
    assert!(frozen.graph.has_dependents("templates/base.html"));
    Ok(())
}

#[tokio::test]
async fn unchanged_tree_plans_nothing_twice() -> TestResult {
    init_tracing();
    let site = SiteTree::docs_site();
    let cfg = default_config();
    let exec = docs_executor(&cfg);

    let mut session = open_session(&site, &cfg);
    let decision = session.reconcile(false, None);
    session.execute(decision, &exec).await?;
    let tracked: Vec<String> = session.state().records.keys().cloned().collect();

    for _ in 0..2 {
        let decision = session.decide(&BuildRequest::incremental(tracked.clone()));
        assert!(decision.plan.is_empty());
        assert!(!decision.has_work());
        assert!(!session.reconcile(false, None).has_work());
    }

    // Committing an empty decision changes nothing either.
    let decision = session.decide(&BuildRequest::incremental(tracked.clone()));
    session.execute(decision, &exec).await?;
    assert_eq!(exec.executed().len(), 1);
    assert!(!session.decide(&BuildRequest::incremental(tracked)).has_work());
    Ok(())
}

#[tokio::test]
async fn renamed_version_directory_moves_its_pages() -> TestResult {
    init_tracing();
    let site = SiteTree::docs_site();
    let cfg = default_config();
    let exec = docs_executor(&cfg);

    let mut session = open_session(&site, &cfg);
    let decision = session.reconcile(false, None);
    session.execute(decision, &exec).await?;

    // The watcher reports only the two directory names for a rename.
    site.rename("content/versions/v2", "content/versions/v3");
    let decision = session.decide(&BuildRequest::incremental([
        "content/versions/v2",
        "content/versions/v3",
    ]));
    assert!(!decision.plan.is_full());
    assert_eq!(decision.plan.removed, set(&["content/versions/v2/guide.md"]));
    assert_eq!(decision.plan.rebuild, set(&["content/versions/v3/guide.md"]));
    session.execute(decision, &exec).await?;

    let state = session.state();
    assert!(!state.records.contains_key("content/versions/v2/guide.md"));
    assert!(!state.graph.contains_node("content/versions/v2/guide.md"));
    assert!(state.records.contains_key("content/versions/v3/guide.md"));
    assert_eq!(
        state.pages.get("content/versions/v3/guide.md").map(|p| &p.scope),
        Some(&VersionScope::Version("v3".into()))
    );
    Ok(())
}

#[tokio::test]
async fn term_listings_follow_membership_changes() -> TestResult {
    init_tracing();
    let site = SiteTree::docs_site();
    let cfg = default_config();
    let exec = docs_executor(&cfg);
    let tagged = |path: &str, terms: &[&str]| {
        let mut report = UnitReport::new(path, VersionScope::Latest);
        report.terms = terms.iter().map(|t| t.to_string()).collect();
        report
    };
    exec.set_report(tagged("content/guide.md", &["rust"]));

    let mut session = open_session(&site, &cfg);
    let decision = session.reconcile(false, None);
    session.execute(decision, &exec).await?;
    assert!(session.state().graph.node("taxonomy/rust").is_some_and(|n| n.generated));

    // A new member does not depend on the listing, yet the listing changes.
    site.write("content/new.md", "# New\n\ntags: rust");
    exec.set_report(tagged("content/new.md", &["rust"]));
    let decision = session.decide(&BuildRequest::incremental(["content/new.md"]));
    assert_eq!(decision.plan.rebuild, set(&["content/new.md"]));
    let stats = session.execute(decision, &exec).await?;

    assert_eq!(stats.rebuilt, 2);
    assert!(stats.stale_listings.is_empty());
    assert_eq!(exec.last().expect("listing pass").units, set(&["taxonomy/rust"]));
    assert_eq!(
        session.state().taxonomy.members("taxonomy/rust"),
        Some(&set(&["content/guide.md", "content/new.md"]))
    );
    assert!(session.state().pending.is_empty());
    assert!(!session.decide(&BuildRequest::incremental(Vec::<String>::new())).has_work());

    // Retagging reaches the old listing through its edge and the new
    // listing through the follow-up pass.
    site.write("content/guide.md", "# Guide\n\ntags: wasm");
    exec.set_report(tagged("content/guide.md", &["wasm"]));
    let decision = session.decide(&BuildRequest::incremental(["content/guide.md"]));
    assert!(decision.plan.rebuild.contains("taxonomy/rust"));
    session.execute(decision, &exec).await?;
    assert_eq!(exec.last().expect("listing pass").units, set(&["taxonomy/wasm"]));
    assert!(session.state().pending.is_empty());
    Ok(())
}
