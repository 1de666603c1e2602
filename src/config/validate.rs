// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, SiteGraphError};
use crate::layout::SiteLayout;

/// Upper bound for the collecting window; anything longer makes the dev
/// loop feel broken.
const MAX_DEBOUNCE_MS: u64 = 60_000;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = SiteGraphError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.engine, raw.layout, raw.executor))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_engine(cfg)?;
    validate_layout(cfg)?;
    validate_executor(cfg)?;
    Ok(())
}

fn validate_engine(cfg: &RawConfigFile) -> Result<()> {
    if cfg.engine.max_depth == 0 {
        return Err(SiteGraphError::ConfigError(
            "[engine].max_depth must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.engine.debounce_ms > MAX_DEBOUNCE_MS {
        return Err(SiteGraphError::ConfigError(format!(
            "[engine].debounce_ms must be <= {MAX_DEBOUNCE_MS} (got {})",
            cfg.engine.debounce_ms
        )));
    }

    if cfg.engine.state_dir.as_os_str().is_empty() {
        return Err(SiteGraphError::ConfigError(
            "[engine].state_dir must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_layout(cfg: &RawConfigFile) -> Result<()> {
    if cfg.layout.content.is_empty() {
        return Err(SiteGraphError::ConfigError(
            "[layout].content must list at least one pattern".to_string(),
        ));
    }

    if cfg.layout.versions_dir.trim_matches('/').is_empty() {
        return Err(SiteGraphError::ConfigError(
            "[layout].versions_dir must not be empty".to_string(),
        ));
    }

    // Compiling the layout surfaces bad globs with the offending pattern.
    SiteLayout::from_section(&cfg.layout)
        .map_err(|e| SiteGraphError::ConfigError(format!("[layout]: {e:#}")))?;

    Ok(())
}

fn validate_executor(cfg: &RawConfigFile) -> Result<()> {
    if let Some(cmd) = &cfg.executor.cmd {
        if cmd.trim().is_empty() {
            return Err(SiteGraphError::ConfigError(
                "[executor].cmd must not be blank when set".to_string(),
            ));
        }
    }
    Ok(())
}
