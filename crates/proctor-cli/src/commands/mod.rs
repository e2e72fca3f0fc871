//! Subcommand implementations.

use std::path::Path;

use anyhow::Result;

use proctor_client::{load_config_from, ProctorConfig};

pub mod init;
pub mod remaining;
pub mod run;

/// Load the config and apply a `--api-url` override.
fn load_config(api_url: Option<String>, config_path: Option<&Path>) -> Result<ProctorConfig> {
    let mut config = load_config_from(config_path)?;
    if let Some(url) = api_url {
        config.base_url = url;
    }
    tracing::debug!(?config, "configuration loaded");
    Ok(config)
}
