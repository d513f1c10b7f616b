//! Routing tables owned by the hub's dispatch loop.

use std::collections::HashMap;

use switchboard_types::error::HubError;
use switchboard_types::hub::{BusName, ReactorName, Reply};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::event::Event;

/// Outcome of routing one reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    Delivered,
    UnknownBus,
    BusGone,
}

/// Per-reactor event senders and per-bus reply senders.
///
/// Only the dispatch loop touches a `Router`, so no locking is needed.
#[derive(Debug, Default)]
pub struct Router {
    reactors: Vec<(ReactorName, mpsc::Sender<Event>)>,
    buses: HashMap<BusName, mpsc::Sender<Reply>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_reactor(&mut self, name: ReactorName, events: mpsc::Sender<Event>) {
        self.reactors.push((name, events));
    }

    pub fn add_bus(&mut self, name: BusName, replies: mpsc::Sender<Reply>) {
        self.buses.insert(name, replies);
    }

    pub fn reactor_count(&self) -> usize {
        self.reactors.len()
    }

    /// Hand `event` to every live reactor, one at a time.
    ///
    /// Each send waits until the reactor's channel accepts the event.
    /// Reactors that have already exited are dropped from the table.
    pub async fn fan_out(&mut self, cancel: &CancellationToken, event: &Event) -> Result<(), HubError> {
        for (name, events) in &self.reactors {
            tokio::select! {
                _ = cancel.cancelled() => return Err(HubError::ShuttingDown),
                sent = events.send(event.clone()) => {
                    if sent.is_err() {
                        debug!(reactor = %name, event_id = event.id(), "reactor has exited, skipping");
                    }
                }
            }
        }

        self.reactors.retain(|(_, events)| !events.is_closed());
        Ok(())
    }

    /// Forward `reply` to the bus it names. Replies are never deduplicated.
    pub async fn route(&self, cancel: &CancellationToken, reply: Reply) -> Result<Routed, HubError> {
        let Some(replies) = self.buses.get(&reply.bus) else {
            warn!(bus = %reply.bus, event_id = reply.event_id, "reply for unknown bus dropped");
            return Ok(Routed::UnknownBus);
        };

        let bus = reply.bus.clone();
        tokio::select! {
            _ = cancel.cancelled() => Err(HubError::ShuttingDown),
            sent = replies.send(reply) => match sent {
                Ok(()) => Ok(Routed::Delivered),
                Err(_) => {
                    warn!(bus = %bus, "bus has exited, reply dropped");
                    Ok(Routed::BusGone)
                }
            },
        }
    }
}
