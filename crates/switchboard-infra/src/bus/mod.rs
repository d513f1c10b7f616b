//! Concrete buses and their registry factories.
//!
//! - `console` -- `ConsoleBus`, line-oriented terminal bus
//! - `discord` -- `DiscordBus`, gateway session plus REST replies

pub mod console;
pub mod discord;

use switchboard_core::bus::BoxBus;
use switchboard_core::registry::{ComponentKind, ComponentRegistry, RegistryError};
use switchboard_types::config::ComponentOptions;
use switchboard_types::error::GatewayError;
use switchboard_types::hub::BusName;
use thiserror::Error;

pub use console::ConsoleBus;
pub use discord::DiscordBus;

/// Why a bus could not be built from its options.
#[derive(Debug, Error)]
pub enum BusConfigError {
    #[error(transparent)]
    Options(#[from] serde_json::Error),

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Register the `console` and `discord` bus types.
pub fn register_buses(registry: &mut ComponentRegistry) -> Result<(), RegistryError> {
    registry.register_bus(
        "console",
        Box::new(|name: BusName, _options: &ComponentOptions| Ok(BoxBus::new(ConsoleBus::stdio(name)))),
    )?;
    registry.register_bus(
        "discord",
        Box::new(|name: BusName, options: &ComponentOptions| {
            DiscordBus::from_options(name.clone(), options)
                .map(BoxBus::new)
                .map_err(|e| RegistryError::invalid_options(ComponentKind::Bus, &name, e))
        }),
    )?;
    Ok(())
}
