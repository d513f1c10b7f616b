//! Name-keyed factories that turn configuration entries into components.
//!
//! A registry maps a component `type` string (e.g. `"echo"`) to a
//! constructor. [`ComponentRegistry::assemble`] walks a [`HubConfig`],
//! builds every bus and reactor it names, and reports every failure at
//! once rather than stopping at the first.

use std::collections::BTreeMap;
use std::fmt;

use switchboard_types::config::{ComponentOptions, HubConfig};
use switchboard_types::error::HubError;
use switchboard_types::hub::{BusName, ReactorName};
use thiserror::Error;
use tracing::debug;

use crate::bus::BoxBus;
use crate::hub::EventHub;
use crate::reactor::{BoxReactor, EchoReactor, EjectReactor, UptimeReactor};

pub type BusFactory =
    Box<dyn Fn(BusName, &ComponentOptions) -> Result<BoxBus, RegistryError> + Send + Sync>;

pub type ReactorFactory =
    Box<dyn Fn(ReactorName, &ComponentOptions) -> Result<BoxReactor, RegistryError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    Bus,
    Reactor,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentKind::Bus => f.write_str("bus"),
            ComponentKind::Reactor => f.write_str("reactor"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{kind} type '{type_name}' is already registered")]
    AlreadyRegistered {
        kind: ComponentKind,
        type_name: String,
    },

    #[error("unknown type '{type_name}' for {kind} '{name}'")]
    UnknownType {
        kind: ComponentKind,
        name: String,
        type_name: String,
    },

    #[error("invalid options for {kind} '{name}': {message}")]
    InvalidOptions {
        kind: ComponentKind,
        name: String,
        message: String,
    },

    #[error(transparent)]
    Hub(#[from] HubError),
}

impl RegistryError {
    pub fn invalid_options(kind: ComponentKind, name: impl fmt::Display, err: impl fmt::Display) -> Self {
        RegistryError::InvalidOptions {
            kind,
            name: name.to_string(),
            message: err.to_string(),
        }
    }
}

/// Every failure from one [`ComponentRegistry::assemble`] call.
#[derive(Debug, Error)]
#[error("assembly failed:\n{}", format_errors(.errors))]
pub struct AssemblyError {
    pub errors: Vec<RegistryError>,
}

fn format_errors(errors: &[RegistryError]) -> String {
    errors
        .iter()
        .map(|e| format!("    {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Factories for buses and reactors, keyed by type name.
#[derive(Default)]
pub struct ComponentRegistry {
    buses: BTreeMap<String, BusFactory>,
    reactors: BTreeMap<String, ReactorFactory>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the reactors that ship with the core already registered.
    pub fn with_builtin_reactors() -> Self {
        let mut registry = Self::new();
        let builtins: [(&str, ReactorFactory); 3] = [
            (
                "echo",
                Box::new(|name: ReactorName, options: &ComponentOptions| {
                    EchoReactor::from_options(name.clone(), options)
                        .map(BoxReactor::new)
                        .map_err(|e| RegistryError::invalid_options(ComponentKind::Reactor, &name, e))
                }),
            ),
            (
                "uptime",
                Box::new(|name: ReactorName, _options: &ComponentOptions| {
                    Ok(BoxReactor::new(UptimeReactor::new(name)))
                }),
            ),
            (
                "eject",
                Box::new(|name: ReactorName, options: &ComponentOptions| {
                    EjectReactor::from_options(name.clone(), options)
                        .map(BoxReactor::new)
                        .map_err(|e| RegistryError::invalid_options(ComponentKind::Reactor, &name, e))
                }),
            ),
        ];

        for (type_name, factory) in builtins {
            registry.reactors.insert(type_name.to_string(), factory);
        }
        registry
    }

    pub fn register_bus(&mut self, type_name: &str, factory: BusFactory) -> Result<(), RegistryError> {
        if self.buses.contains_key(type_name) {
            return Err(RegistryError::AlreadyRegistered {
                kind: ComponentKind::Bus,
                type_name: type_name.to_string(),
            });
        }
        self.buses.insert(type_name.to_string(), factory);
        Ok(())
    }

    pub fn register_reactor(&mut self, type_name: &str, factory: ReactorFactory) -> Result<(), RegistryError> {
        if self.reactors.contains_key(type_name) {
            return Err(RegistryError::AlreadyRegistered {
                kind: ComponentKind::Reactor,
                type_name: type_name.to_string(),
            });
        }
        self.reactors.insert(type_name.to_string(), factory);
        Ok(())
    }

    pub fn bus_types(&self) -> impl Iterator<Item = &str> {
        self.buses.keys().map(String::as_str)
    }

    pub fn reactor_types(&self) -> impl Iterator<Item = &str> {
        self.reactors.keys().map(String::as_str)
    }

    pub fn build_bus(&self, name: &str, type_name: &str, options: &ComponentOptions) -> Result<BoxBus, RegistryError> {
        let factory = self.buses.get(type_name).ok_or_else(|| RegistryError::UnknownType {
            kind: ComponentKind::Bus,
            name: name.to_string(),
            type_name: type_name.to_string(),
        })?;
        factory(BusName::new(name), options)
    }

    pub fn build_reactor(
        &self,
        name: &str,
        type_name: &str,
        options: &ComponentOptions,
    ) -> Result<BoxReactor, RegistryError> {
        let factory = self.reactors.get(type_name).ok_or_else(|| RegistryError::UnknownType {
            kind: ComponentKind::Reactor,
            name: name.to_string(),
            type_name: type_name.to_string(),
        })?;
        factory(ReactorName::new(name), options)
    }

    /// Build a hub from `config`, collecting every failure.
    pub fn assemble(&self, config: &HubConfig) -> Result<EventHub, AssemblyError> {
        let mut hub = EventHub::new(config.name.clone());
        let mut errors = Vec::new();

        for (name, component) in &config.bus {
            debug!(bus = %name, kind = %component.kind, "assembling bus");
            match self.build_bus(name, &component.kind, &component.options) {
                Ok(bus) => {
                    if let Err(err) = hub.add_bus(bus) {
                        errors.push(err.into());
                    }
                }
                Err(err) => errors.push(err),
            }
        }

        for (name, component) in &config.reactor {
            debug!(reactor = %name, kind = %component.kind, "assembling reactor");
            match self.build_reactor(name, &component.kind, &component.options) {
                Ok(reactor) => {
                    if let Err(err) = hub.add_reactor(ReactorName::new(name.as_str()), reactor) {
                        errors.push(err.into());
                    }
                }
                Err(err) => errors.push(err),
            }
        }

        if errors.is_empty() {
            Ok(hub)
        } else {
            Err(AssemblyError { errors })
        }
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("buses", &self.buses.keys().collect::<Vec<_>>())
            .field("reactors", &self.reactors.keys().collect::<Vec<_>>())
            .finish()
    }
}
