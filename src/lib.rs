// src/lib.rs

pub mod cache;
pub mod cli;
pub mod config;
pub mod detect;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod graph;
pub mod layout;
pub mod logging;
pub mod planner;
pub mod session;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::sync::mpsc;
use tracing::info;

use crate::cli::CliArgs;
use crate::config::load_and_validate;
use crate::engine::{CoordinatorCore, Runtime, RuntimeEvent, RuntimeOptions, ShellOptions};
use crate::exec::{BuildExecutor, CommandExecutor};
use crate::fs::RealFileSystem;
use crate::session::BuildSession;
use crate::types::VersionScope;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and the persisted build session
/// - the coordinator core and its runtime
/// - the executor command, if one is configured
/// - (optional) file watcher
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let root = config_root_dir(&config_path);

    let scope = args
        .scope
        .as_deref()
        .map(|s| s.parse::<VersionScope>().map_err(|e| anyhow!(e)))
        .transpose()?;

    let session = BuildSession::open(&cfg, &root, Arc::new(RealFileSystem))?;
    if session.is_cold() {
        info!("no usable snapshot; the first build will be full");
    }

    let executor: Option<Arc<dyn BuildExecutor>> = cfg
        .executor()
        .cmd
        .as_ref()
        .map(|cmd| Arc::new(CommandExecutor::new(cmd.clone(), root.clone())) as Arc<dyn BuildExecutor>);

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    let exit_when_idle = args.once || args.dry_run;

    // Optional file watcher (disabled in --once and --dry-run modes).
    let _watcher_handle = if !exit_when_idle {
        let layout = session.planner().layout().clone();
        Some(crate::watch::spawn_watcher(
            root.clone(),
            layout,
            &cfg.engine().state_dir,
            rt_tx.clone(),
        )?)
    } else {
        None
    };

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    let core = CoordinatorCore::new(RuntimeOptions {
        exit_when_idle,
        debounce: Duration::from_millis(cfg.engine().debounce_ms),
    });
    let shell = ShellOptions {
        full: args.full,
        scope,
        dry_run: args.dry_run,
    };

    let runtime = Runtime::new(core, rt_rx, session, executor, shell);
    runtime.run().await?;
    Ok(())
}

/// Figure out the site root.
///
/// - If the config path has a non-empty parent (e.g. "site/Sitegraph.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Sitegraph.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
