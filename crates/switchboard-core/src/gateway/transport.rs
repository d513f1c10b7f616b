//! Transport ports the gateway client is generic over.
//!
//! The WebSocket implementation lives in `switchboard-infra`; tests drive the
//! client through an in-memory implementation instead.

use std::future::Future;

use switchboard_types::error::GatewayError;

/// One inbound transport message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    Text(String),
    /// Binary payloads are not part of the JSON protocol; only the size is kept.
    Binary(usize),
    /// The peer closed the stream, with its close code and reason if it sent one.
    Close(Option<CloseInfo>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
}

impl CloseInfo {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

/// Write half of a gateway connection.
pub trait FrameSink: Send + 'static {
    fn send_text(&mut self, text: String) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Close the stream. Errors are ignored; the connection is being dropped anyway.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Read half of a gateway connection. `None` means the stream ended.
pub trait FrameStream: Send + 'static {
    fn next_frame(&mut self) -> impl Future<Output = Option<Result<Incoming, GatewayError>>> + Send;
}

/// Opens gateway connections.
pub trait Dialer: Send + Sync + 'static {
    type Sink: FrameSink;
    type Stream: FrameStream;

    fn dial(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<(Self::Sink, Self::Stream), GatewayError>> + Send;
}

/// Resolves the primary gateway endpoint.
pub trait Discovery: Send + Sync + 'static {
    fn gateway_url(&self) -> impl Future<Output = Result<String, GatewayError>> + Send;
}
