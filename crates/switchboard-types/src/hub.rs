//! Names and reply envelopes routed through the event hub.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a bus registered with the hub.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusName(String);

impl BusName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BusName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BusName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Identifier of a reactor registered with the hub.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReactorName(String);

impl ReactorName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReactorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReactorName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Opaque platform address a reply is sent to (e.g. a channel id).
///
/// Buses that have a single implicit destination (the console) use the
/// empty address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outbound message addressed to a specific bus and platform address.
///
/// Produced by a reactor (explicit reply) or synthesized by the hub when an
/// event's fallback deadline expires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    /// Bus the reply is routed to.
    pub bus: BusName,
    /// Platform address on that bus.
    pub address: Address,
    pub text: String,
    /// Id of the event this reply answers.
    pub event_id: u64,
}
