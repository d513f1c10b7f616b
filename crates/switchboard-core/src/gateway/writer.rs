//! The single outbound stream of a session, shared by the frame reader and
//! the heartbeat task.

use std::sync::Arc;
use std::time::Duration;

use switchboard_types::error::GatewayError;
use switchboard_types::gateway::GatewayFrame;
use tokio::sync::Mutex;
use tracing::debug;

use super::transport::FrameSink;

/// Serializes writes to the current sink. Every write is bounded by
/// `timeout`. Cloning shares the sink.
#[derive(Debug)]
pub struct FrameWriter<S> {
    sink: Arc<Mutex<Option<S>>>,
    timeout: Duration,
}

impl<S> Clone for FrameWriter<S> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            timeout: self.timeout,
        }
    }
}

impl<S: FrameSink> FrameWriter<S> {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sink: Arc::new(Mutex::new(None)),
            timeout,
        }
    }

    pub async fn send(&self, frame: &GatewayFrame) -> Result<(), GatewayError> {
        let text = frame
            .encode()
            .map_err(|e| GatewayError::Write(format!("could not encode frame: {e}")))?;

        let mut guard = self.sink.lock().await;
        let Some(sink) = guard.as_mut() else {
            return Err(GatewayError::Write("not connected".to_string()));
        };

        debug!(op = frame.op, "sending gateway frame");
        match tokio::time::timeout(self.timeout, sink.send_text(text)).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Write(format!(
                "write timed out after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }

    /// Install a fresh sink, closing the one it replaces.
    pub async fn replace(&self, sink: S) {
        let previous = self.sink.lock().await.replace(sink);
        if let Some(mut previous) = previous {
            previous.close().await;
        }
    }

    /// Close and drop the current sink.
    pub async fn close(&self) {
        let previous = self.sink.lock().await.take();
        if let Some(mut previous) = previous {
            previous.close().await;
        }
    }
}
