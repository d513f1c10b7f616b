//! Shared domain types for Switchboard.
//!
//! This crate contains the types that cross every boundary of the hub:
//! component names, reply envelopes, the gateway wire format, hub
//! configuration, and the error enums shared by all layers.
//!
//! Zero runtime dependencies -- only serde, serde_json, thiserror.

pub mod config;
pub mod error;
pub mod gateway;
pub mod hub;
