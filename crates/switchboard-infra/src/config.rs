//! Hub configuration loader.
//!
//! Reads a `switchboard.toml` file and deserializes it into [`HubConfig`].
//! Unlike optional settings files, the hub config is required: a missing or
//! malformed file is an error the caller must surface.

use std::path::{Path, PathBuf};

use switchboard_types::config::HubConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Load and decode the hub config at `path`.
pub async fn load_hub_config(path: &Path) -> Result<HubConfig, ConfigError> {
    let content = tokio::fs::read_to_string(path).await.map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let config = parse_hub_config(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!(
        path = %path.display(),
        buses = config.bus.len(),
        reactors = config.reactor.len(),
        "loaded hub config"
    );
    Ok(config)
}

pub fn parse_hub_config(content: &str) -> Result<HubConfig, toml::de::Error> {
    toml::from_str(content)
}
