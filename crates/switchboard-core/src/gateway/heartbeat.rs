//! Per-session heartbeat task.

use std::sync::Arc;
use std::time::Duration;

use switchboard_types::error::GatewayError;
use switchboard_types::gateway::GatewayFrame;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::session::SessionState;
use super::transport::FrameSink;
use super::writer::FrameWriter;

/// Signals from the heartbeat task to the frame reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// A heartbeat went unacknowledged for a whole interval.
    Zombied,
}

/// Random first delay inside `[0, interval)`.
pub fn first_delay(interval: Duration) -> Duration {
    interval.mul_f64(fastrand::f64())
}

/// Handle to a running heartbeat task.
#[derive(Debug)]
pub struct Heartbeat {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Heartbeat {
    /// Start beating every `interval`. The task ends on `parent`
    /// cancellation, on [`Heartbeat::stop`], or after reporting a zombied
    /// connection.
    pub fn spawn<S: FrameSink>(
        interval: Duration,
        session: Arc<SessionState>,
        writer: FrameWriter<S>,
        control: mpsc::Sender<Control>,
        errors: mpsc::Sender<GatewayError>,
        parent: &CancellationToken,
    ) -> Self {
        let cancel = parent.child_token();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let delay = first_delay(interval);
            debug!(delay_ms = delay.as_millis() as u64, "waiting to send first heartbeat");

            let timer = tokio::time::sleep(delay);
            tokio::pin!(timer);
            let mut first = true;

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("heartbeat task stopped");
                        return;
                    }
                    _ = &mut timer => {
                        if !session.take_ack() && !first {
                            warn!("previous heartbeat was never acknowledged");
                            let _ = control.send(Control::Zombied).await;
                            return;
                        }
                        first = false;

                        let seq = session.sequence();
                        debug!(seq = ?seq, "sending heartbeat");
                        if let Err(err) = writer.send(&GatewayFrame::heartbeat(seq)).await {
                            warn!(error = %err, "heartbeat write failed");
                            let _ = errors.send(err).await;
                        }
                        timer.as_mut().reset(tokio::time::Instant::now() + interval);
                    }
                }
            }
        });

        Self { cancel, handle }
    }

    /// Stop the task and wait until it has exited, so it can never write to
    /// a stream that replaced its own.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}
