use dotenvy::dotenv;
use eyre::Result;
use std::path::{Path, PathBuf};
use switchboard_core::config::SessionConfig;

use super::Cli;

pub fn load_env() -> Result<()> {
    dotenv().ok();
    Ok(())
}

/// File the session configuration is read from and written to.
pub fn config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let discovered = switchboard_core::utils::paths::AppPaths::discover_configs();
    match discovered.into_iter().next() {
        Some(path) => Ok(path),
        None => Ok(SessionConfig::config_path()?),
    }
}

/// Loads the configuration and applies command-line overrides.
pub fn load_config(cli: &Cli) -> Result<SessionConfig> {
    let mut config = match &cli.config {
        Some(path) => SessionConfig::load_from(path)?,
        None => SessionConfig::load()?,
    };
    if let Some(delay_ms) = cli.delay_ms {
        config.stream_delay_ms = delay_ms;
    }
    if let Some(log_dir) = &cli.log_dir {
        config.log_dir = Some(log_dir.clone());
    }
    Ok(config)
}
