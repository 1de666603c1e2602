// src/main.rs

use std::process::ExitCode;

use sitegraph::errors::SiteGraphError;
use sitegraph::{cli, logging, run};

/// A bad `site.toml` is reported apart from failures while building, so
/// wrappers can tell "fix your config" from "try again".
const EXIT_BUILD: u8 = 1;
const EXIT_CONFIG: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("sitegraph: {err:#}");
        return ExitCode::from(EXIT_CONFIG);
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "sitegraph stopped");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<SiteGraphError>() {
        Some(SiteGraphError::ConfigError(_) | SiteGraphError::TomlError(_)) => EXIT_CONFIG,
        _ => EXIT_BUILD,
    }
}
