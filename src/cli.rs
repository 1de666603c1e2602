// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `sitegraph`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sitegraph",
    version,
    about = "Decide what a content site build must redo after files change.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Sitegraph.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Sitegraph.toml")]
    pub config: String,

    /// Reconcile against the last snapshot and build once, no watching.
    #[arg(long)]
    pub once: bool,

    /// Ignore the incremental plan and rebuild everything.
    #[arg(long)]
    pub full: bool,

    /// Only rebuild consumers in this version scope (e.g. `v2`, `latest`).
    ///
    /// Consumers in other scopes are reported as deferred.
    #[arg(long, value_name = "SCOPE")]
    pub scope: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SITEGRAPH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Compute and print the plan, but don't execute or persist anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
