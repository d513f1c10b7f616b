//! Infrastructure layer for Switchboard.
//!
//! Implements the ports defined in `switchboard-core` against real I/O: the
//! WebSocket gateway transport and REST client, the console and Discord
//! buses, and loading `switchboard.toml` from disk.

pub mod bus;
pub mod config;
pub mod gateway;
