// src/logging.rs

//! Logging setup for `sitegraph` using `tracing` + `tracing-subscriber`.
//!
//! The filter is built from, in order of precedence:
//! 1. `--log-level` (applies to every target)
//! 2. `SITEGRAPH_LOG`, a full `EnvFilter` directive such as
//!    `info,sitegraph::planner=debug`
//! 3. `info`
//!
//! The watcher backend and glob matching are capped at `warn` unless the
//! directive names them. Logs go to STDERR; `--dry-run` prints the computed
//! plan on STDOUT.

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "SITEGRAPH_LOG";

/// Targets that flood debug output on every filesystem event.
const QUIET_TARGETS: &[&str] = &["notify", "globset"];

/// Initialise the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV).ok();
    let directives = filter_directives(cli_level, env.as_deref());
    let filter = EnvFilter::try_new(&directives)
        .with_context(|| format!("invalid {LOG_ENV} filter {directives:?}"))?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!(err))
}

fn filter_directives(cli_level: Option<LogLevel>, env: Option<&str>) -> String {
    let base = match (cli_level, env.map(str::trim).filter(|s| !s.is_empty())) {
        (Some(level), _) => level_name(level).to_string(),
        (None, Some(env)) => env.to_string(),
        (None, None) => "info".to_string(),
    };

    let mut directives = vec![base.clone()];
    for target in QUIET_TARGETS {
        if !base.contains(target) {
            directives.push(format!("{target}=warn"));
        }
    }
    directives.join(",")
}

fn level_name(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
