//! Session state shared between the frame reader and the heartbeat task.
//!
//! The frame reader is the only writer of the guarded fields. The heartbeat
//! task reads the sequence number and flips the acknowledgement flag, which
//! is an atomic of its own.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock};
use std::time::Duration;

use switchboard_types::error::GatewayError;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Where the client is in its connection lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionPhase {
    #[default]
    Disconnected,
    Connecting,
    AwaitingHandshake,
    Identifying,
    Resuming,
    Reconnecting,
    Steady,
    Fatal,
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionPhase::Disconnected => "disconnected",
            ConnectionPhase::Connecting => "connecting",
            ConnectionPhase::AwaitingHandshake => "awaiting-handshake",
            ConnectionPhase::Identifying => "identifying",
            ConnectionPhase::Resuming => "resuming",
            ConnectionPhase::Reconnecting => "reconnecting",
            ConnectionPhase::Steady => "steady",
            ConnectionPhase::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

/// Copy of the guarded session fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub sequence: Option<u64>,
    pub session_id: Option<String>,
    pub resume_url: Option<String>,
    pub gateway_url: Option<String>,
    pub heartbeat_interval: Option<Duration>,
    pub handshake_complete: bool,
    pub phase: ConnectionPhase,
}

/// Session fields behind a lock, plus the heartbeat acknowledgement flag.
#[derive(Debug, Default)]
pub struct SessionState {
    fields: Mutex<SessionSnapshot>,
    acked: AtomicBool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SessionSnapshot> {
        // Nothing panics while holding the lock, but don't cascade if it does.
        self.fields.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().clone()
    }

    pub fn sequence(&self) -> Option<u64> {
        self.lock().sequence
    }

    /// Record a sequence number. Older or equal values are ignored.
    pub fn observe_seq(&self, seq: u64) {
        let mut fields = self.lock();
        if fields.sequence.is_none_or(|current| seq > current) {
            fields.sequence = Some(seq);
        }
    }

    /// Flip the handshake flag. Returns `true` only on the false -> true
    /// transition, so the caller that gets `true` sends Identify.
    pub fn begin_handshake(&self) -> bool {
        let mut fields = self.lock();
        !std::mem::replace(&mut fields.handshake_complete, true)
    }

    pub fn set_heartbeat_interval(&self, interval: Duration) {
        self.lock().heartbeat_interval = Some(interval);
    }

    pub fn set_ready(&self, session_id: String, resume_url: String) {
        let mut fields = self.lock();
        fields.session_id = Some(session_id);
        fields.resume_url = Some(resume_url);
    }

    pub fn gateway_url(&self) -> Option<String> {
        self.lock().gateway_url.clone()
    }

    pub fn cache_gateway_url(&self, url: String) {
        self.lock().gateway_url = Some(url);
    }

    /// Session id and resume endpoint, if the session can be resumed.
    pub fn resume_target(&self) -> Option<(String, String)> {
        let fields = self.lock();
        Some((fields.session_id.clone()?, fields.resume_url.clone()?))
    }

    /// Forget everything except the cached primary endpoint.
    pub fn reset(&self) {
        let mut fields = self.lock();
        *fields = SessionSnapshot {
            gateway_url: fields.gateway_url.take(),
            phase: fields.phase,
            ..SessionSnapshot::default()
        };
        self.acked.store(false, Ordering::Release);
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.lock().phase
    }

    /// Move to `phase`, logging the transition. Fatal is terminal.
    pub fn set_phase(&self, phase: ConnectionPhase) {
        let mut fields = self.lock();
        let previous = fields.phase;
        if previous == phase || previous == ConnectionPhase::Fatal {
            return;
        }
        fields.phase = phase;
        drop(fields);
        info!(from = %previous, to = %phase, "gateway phase changed");
    }

    pub fn mark_acked(&self) {
        self.acked.store(true, Ordering::Release);
    }

    /// Clear the ack flag, returning whether the previous heartbeat was acked.
    pub fn take_ack(&self) -> bool {
        self.acked.swap(false, Ordering::AcqRel)
    }

    pub fn is_acked(&self) -> bool {
        self.acked.load(Ordering::Acquire)
    }
}

/// The client's single, irrevocable fatal signal.
#[derive(Debug, Default)]
pub struct FatalSignal {
    error: OnceLock<GatewayError>,
    fired: CancellationToken,
}

impl FatalSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `err` and fire. Only the first call has any effect.
    pub fn trigger(&self, err: GatewayError) -> bool {
        if self.error.set(err).is_err() {
            return false;
        }
        self.fired.cancel();
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.error.get().is_some()
    }

    pub fn error(&self) -> Option<&GatewayError> {
        self.error.get()
    }

    /// Wait for the signal and return the captured error.
    pub async fn wait(&self) -> GatewayError {
        self.fired.cancelled().await;
        match self.error.get() {
            Some(err) => err.clone(),
            None => GatewayError::Session("fatal signal fired without an error".to_string()),
        }
    }
}
