// tests/runtime_fake_executor.rs

mod common;
use crate::common::{default_config, docs_executor, init_tracing, open_session};

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use sitegraph::engine::{CoordinatorCore, Runtime, RuntimeEvent, RuntimeOptions, ShellOptions};
use sitegraph::exec::BuildExecutor;
use sitegraph::planner::FullRebuildReason;
use sitegraph_test_utils::builders::SiteTree;
use sitegraph_test_utils::fake_executor::FakeExecutor;
use sitegraph_test_utils::{wait_for_generation, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn core(exit_when_idle: bool) -> CoordinatorCore {
    CoordinatorCore::new(RuntimeOptions {
        exit_when_idle,
        debounce: Duration::from_millis(50),
    })
}

async fn wait_for_builds(exec: &FakeExecutor, n: usize) {
    while exec.executed().len() < n {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn once_mode_reconciles_builds_and_exits() -> TestResult {
    init_tracing();
    let site = SiteTree::docs_site();
    let cfg = default_config();
    let exec = docs_executor(&cfg);

    let (_tx, rx) = mpsc::channel::<RuntimeEvent>(16);
    let executor: Arc<dyn BuildExecutor> = Arc::new(exec.clone());
    let runtime = Runtime::new(
        core(true),
        rx,
        open_session(&site, &cfg),
        Some(executor),
        ShellOptions::default(),
    );

    let session = with_timeout(runtime.run()).await?;
    assert!(!session.is_cold());

    let builds = exec.executed();
    assert_eq!(builds.len(), 1);
    assert_eq!(builds[0].plan.full_rebuild, Some(FullRebuildReason::ColdCache));
    Ok(())
}

#[tokio::test]
async fn changed_paths_are_debounced_into_one_build() -> TestResult {
    init_tracing();
    let site = SiteTree::docs_site();
    let cfg = default_config();
    let exec = docs_executor(&cfg);

    let (tx, rx) = mpsc::channel::<RuntimeEvent>(16);
    let executor: Arc<dyn BuildExecutor> = Arc::new(exec.clone());
    let session = open_session(&site, &cfg);
    let mut published = session.subscribe();
    let runtime = Runtime::new(core(false), rx, session, Some(executor), ShellOptions::default());
    let handle = tokio::spawn(runtime.run());

    // Startup reconcile on a cold cache.
    wait_for_generation(&mut published, 1).await;

    site.write("content/guide.md", "# Guide\n\nedited");
    site.write("assets/site.css", "body { margin: 0 }");
    tx.send(RuntimeEvent::PathsChanged(vec!["content/guide.md".into()])).await?;
    tx.send(RuntimeEvent::PathsChanged(vec![
        "assets/site.css".into(),
        "content/guide.md".into(),
    ]))
    .await?;

    let frozen = wait_for_generation(&mut published, 2).await;
    let last = frozen.last_build.as_ref().expect("second build stats");
    assert_eq!((last.rebuilt, last.assets), (1, 1));
    tx.send(RuntimeEvent::ShutdownRequested).await?;
    let session = with_timeout(handle).await??;

    let builds = exec.executed();
    assert_eq!(builds.len(), 2);
    let second = &builds[1];
    assert!(!second.plan.is_full());
    assert_eq!(
        second.units.iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["assets/site.css", "content/guide.md"]
    );
    assert!(session.state().pending.is_empty());
    Ok(())
}

#[tokio::test]
async fn dry_run_prints_the_plan_without_building() -> TestResult {
    init_tracing();
    let site = SiteTree::docs_site();
    let cfg = default_config();
    let exec = docs_executor(&cfg);

    let (_tx, rx) = mpsc::channel::<RuntimeEvent>(16);
    let executor: Arc<dyn BuildExecutor> = Arc::new(exec.clone());
    let shell = ShellOptions {
        dry_run: true,
        ..ShellOptions::default()
    };
    let runtime = Runtime::new(core(true), rx, open_session(&site, &cfg), Some(executor), shell);

    let session = with_timeout(runtime.run()).await?;
    assert!(exec.executed().is_empty());
    // Nothing was committed or flushed.
    assert!(session.is_cold());
    assert!(!site.path(".sitegraph/build-cache.json.zst").exists());
    Ok(())
}

#[tokio::test]
async fn without_executor_plans_are_only_logged() -> TestResult {
    init_tracing();
    let site = SiteTree::docs_site();
    let cfg = default_config();

    let (_tx, rx) = mpsc::channel::<RuntimeEvent>(16);
    let runtime = Runtime::new(
        core(true),
        rx,
        open_session(&site, &cfg),
        None,
        ShellOptions::default(),
    );

    let session = with_timeout(runtime.run()).await?;
    assert!(session.is_cold());
    Ok(())
}

#[tokio::test]
async fn executor_error_does_not_stop_the_runtime() -> TestResult {
    init_tracing();
    let site = SiteTree::docs_site();
    let cfg = default_config();
    let exec = docs_executor(&cfg);
    exec.fail_next();

    let (tx, rx) = mpsc::channel::<RuntimeEvent>(16);
    let executor: Arc<dyn BuildExecutor> = Arc::new(exec.clone());
    let runtime = Runtime::new(
        core(false),
        rx,
        open_session(&site, &cfg),
        Some(executor),
        ShellOptions::default(),
    );
    let handle = tokio::spawn(runtime.run());

    // The failed startup build is not recorded; a later batch still builds
    // from the cold state.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(exec.executed().is_empty());

    site.write("content/index.md", "# Home\n\nagain");
    tx.send(RuntimeEvent::PathsChanged(vec!["content/index.md".into()])).await?;
    with_timeout(wait_for_builds(&exec, 1)).await;
    assert!(exec.executed()[0].plan.is_full());

    tx.send(RuntimeEvent::ShutdownRequested).await?;
    let session = with_timeout(handle).await??;
    assert!(!session.is_cold());
    Ok(())
}
