//! Registry wiring for every component type the binary ships with.

use switchboard_core::hub::EventHub;
use switchboard_core::registry::{ComponentRegistry, RegistryError};
use switchboard_infra::bus::register_buses;
use switchboard_types::config::HubConfig;

/// Built-in reactors plus the console and discord buses.
pub fn registry() -> Result<ComponentRegistry, RegistryError> {
    let mut registry = ComponentRegistry::with_builtin_reactors();
    register_buses(&mut registry)?;
    Ok(registry)
}

pub fn assemble(config: &HubConfig) -> anyhow::Result<EventHub> {
    let hub = registry()?.assemble(config)?;
    Ok(hub)
}
