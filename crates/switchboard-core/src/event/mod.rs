//! Events routed through the hub and their bounded-time reply contract.
//!
//! Every event carries a one-shot [`Completion`] and exactly one fallback
//! watchdog. When the hub arms the watchdog, a 250ms timer starts; if no one
//! completes the event first, the watchdog wins completion and pushes a
//! synthesized `"does not compute"` reply onto the hub's reply channel.
//!
//! - `completion` -- `Completion` (first-writer-wins signal) and `EventIds`

pub mod completion;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use switchboard_types::hub::{Address, BusName, Reply};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use completion::{Completion, EventIds};

/// How long an event may go unanswered before the fallback reply fires.
pub const FALLBACK_TIMEOUT: Duration = Duration::from_millis(250);

/// Text of the synthesized fallback reply.
pub const FALLBACK_TEXT: &str = "does not compute";

#[derive(Debug, Default)]
struct Watchdog {
    armed: AtomicBool,
    disarm: CancellationToken,
}

/// One inbound message routed through the hub.
///
/// Cloning is cheap and every clone shares the completion signal and the
/// watchdog, so a reactor holding its own copy can complete or disarm the
/// event the hub armed.
#[derive(Debug, Clone)]
pub struct Event {
    id: u64,
    pub text: String,
    /// Bus the event came from; replies are routed back here.
    pub source_bus: BusName,
    /// Platform address to reply to.
    pub address: Address,
    completion: Completion,
    watchdog: Arc<Watchdog>,
}

impl Event {
    pub fn new(id: u64, source_bus: BusName, text: impl Into<String>, address: Address) -> Self {
        Self {
            id,
            text: text.into(),
            source_bus,
            address,
            completion: Completion::new(),
            watchdog: Arc::new(Watchdog::default()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Start the fallback timer, bound to `replies`.
    ///
    /// Only the first call arms a timer; later calls return `false`. The
    /// timer stops early when the event completes or is marked handled.
    pub fn arm_fallback(&self, replies: mpsc::Sender<Reply>) -> bool {
        if self.watchdog.armed.swap(true, Ordering::AcqRel) {
            return false;
        }

        let completion = self.completion.clone();
        let disarm = self.watchdog.disarm.clone();
        let fallback = Reply {
            bus: self.source_bus.clone(),
            address: self.address.clone(),
            text: FALLBACK_TEXT.to_string(),
            event_id: self.id,
        };

        tokio::spawn(async move {
            tokio::select! {
                _ = disarm.cancelled() => {}
                _ = completion.done() => {}
                _ = tokio::time::sleep(FALLBACK_TIMEOUT) => {
                    if completion.complete() {
                        debug!(event_id = fallback.event_id, "fallback deadline expired");
                        if replies.send(fallback).await.is_err() {
                            debug!("reply channel closed, fallback reply dropped");
                        }
                    }
                }
            }
        });

        true
    }

    /// Cancel the fallback timer without completing the event.
    ///
    /// Used by a reactor that intends to answer explicitly and does not want
    /// to race the watchdog.
    pub fn mark_handled(&self) {
        self.watchdog.disarm.cancel();
    }

    /// Complete the event and build a reply to its source.
    ///
    /// Always yields a reply, even if the event was already completed; the
    /// completion signal itself fires at most once.
    pub fn reply(&self, text: impl Into<String>) -> Reply {
        self.completion.complete();
        self.build_reply(text.into())
    }

    /// Complete the event and build a reply, unless someone else completed
    /// it first.
    pub fn try_reply(&self, text: impl Into<String>) -> Option<Reply> {
        self.completion
            .complete()
            .then(|| self.build_reply(text.into()))
    }

    /// Fire the completion signal without replying.
    pub fn complete(&self) -> bool {
        self.completion.complete()
    }

    pub fn is_complete(&self) -> bool {
        self.completion.is_complete()
    }

    /// Wait until the event has been answered by either path.
    pub async fn done(&self) {
        self.completion.done().await;
    }

    fn build_reply(&self, text: String) -> Reply {
        Reply {
            bus: self.source_bus.clone(),
            address: self.address.clone(),
            text,
            event_id: self.id,
        }
    }
}
