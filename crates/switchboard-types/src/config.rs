//! Hub configuration types.
//!
//! `HubConfig` represents the top-level `switchboard.toml`: a hub name, an
//! optional log level, and named tables of buses and reactors. Each component
//! table names its `type` (the registry key) and carries arbitrary options
//! that are handed to the component's factory untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Arbitrary per-component options, decoded by the component's factory.
pub type ComponentOptions = serde_json::Map<String, serde_json::Value>;

/// Top-level configuration for a hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    #[serde(default = "default_name")]
    pub name: String,

    /// Tracing filter directive used when neither `RUST_LOG` nor CLI
    /// verbosity says otherwise (e.g. "info", "switchboard=debug").
    #[serde(default)]
    pub log_level: Option<String>,

    #[serde(default)]
    pub bus: BTreeMap<String, ComponentConfig>,

    #[serde(default)]
    pub reactor: BTreeMap<String, ComponentConfig>,
}

fn default_name() -> String {
    "switchboard".to_string()
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: None,
            bus: BTreeMap::new(),
            reactor: BTreeMap::new(),
        }
    }
}

/// One `[bus.<name>]` or `[reactor.<name>]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentConfig {
    /// Registry key of the component factory.
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(flatten)]
    pub options: ComponentOptions,
}
