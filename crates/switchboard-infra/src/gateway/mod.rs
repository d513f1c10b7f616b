//! Network adapters for the gateway client.
//!
//! - `rest` -- `DiscordRest`, discovery and message posting over reqwest
//! - `ws` -- `WsDialer`, the tokio-tungstenite transport

pub mod rest;
pub mod ws;

pub use rest::{DEFAULT_API_BASE, DiscordRest};
pub use ws::{WsDialer, WsFrames, WsSink};
