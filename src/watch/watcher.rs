// src/watch/watcher.rs

use std::path::{Path, PathBuf};

use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::RuntimeEvent;
use crate::layout::SiteLayout;
use crate::watch::path_utils::relative_str;

/// Handle for the filesystem watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive; dropping it stops
/// watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Watch `root` recursively and forward changed paths to the runtime.
///
/// Paths are made root-relative (`/`-separated). Excluded paths and
/// anything under `state_dir` are dropped here so the engine's own writes
/// never trigger a build.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    layout: SiteLayout,
    state_dir: &Path,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> Result<WatcherHandle> {
    let root = root.into();
    let root = root.canonicalize().unwrap_or_else(|_| root.clone());
    let state_prefix = format!(
        "{}/",
        state_dir.to_string_lossy().replace('\\', "/").trim_matches('/')
    );

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    eprintln!("sitegraph: failed to forward notify event: {err}");
                }
            }
            Err(err) => {
                eprintln!("sitegraph: file watch error: {err}");
            }
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;
    info!("file watcher started on {:?}", root);

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if matches!(event.kind, EventKind::Access(_)) {
                continue;
            }
            let paths = relevant_paths(&root, &layout, &state_prefix, &event.paths);
            if paths.is_empty() {
                continue;
            }
            debug!(?paths, kind = ?event.kind, "forwarding changed paths");
            if runtime_tx.send(RuntimeEvent::PathsChanged(paths)).await.is_err() {
                warn!("runtime is gone; stopping watcher loop");
                break;
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: watcher })
}

/// Root-relative paths of an event that the engine cares about.
pub fn relevant_paths(root: &Path, layout: &SiteLayout, state_prefix: &str, paths: &[PathBuf]) -> Vec<String> {
    let mut out: Vec<String> = paths
        .iter()
        .filter_map(|p| relative_str(root, p))
        .filter(|rel| !rel.is_empty())
        .filter(|rel| !rel.starts_with(state_prefix) && !layout.is_excluded(rel))
        .collect();
    out.sort();
    out.dedup();
    out
}
