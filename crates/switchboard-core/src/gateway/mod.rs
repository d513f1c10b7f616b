//! Gateway protocol client: one persistent duplex session to the chat
//! platform, with handshake, heartbeating, sequence tracking, and
//! resume/reconnect recovery.
//!
//! - `client` -- `GatewayClient`, the frame loop and recovery paths
//! - `config` -- `GatewayConfig` timeouts and `ResumePolicy`
//! - `heartbeat` -- per-session heartbeat task
//! - `session` -- `SessionState`, `ConnectionPhase`, `FatalSignal`
//! - `transport` -- `Dialer` / `FrameSink` / `FrameStream` / `Discovery` ports
//! - `writer` -- `FrameWriter`, the serialized outbound stream

pub mod client;
pub mod config;
pub mod heartbeat;
pub mod session;
pub mod transport;
pub mod writer;

#[cfg(test)]
pub(crate) mod scripted;

pub use client::{GatewayClient, gateway_endpoint};
pub use config::{GatewayConfig, ResumePolicy};
pub use session::{ConnectionPhase, FatalSignal, SessionSnapshot, SessionState};
pub use transport::{CloseInfo, Dialer, Discovery, FrameSink, FrameStream, Incoming};
