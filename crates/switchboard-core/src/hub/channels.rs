//! Channel bundles handed to buses and reactors when the hub starts them.

use switchboard_types::error::HubError;
use switchboard_types::hub::{Address, BusName, Reply};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::event::{Event, EventIds};

/// What a bus receives from the hub: an outbound event channel, its own
/// inbound reply channel, and the shared non-fatal error sink.
#[derive(Debug)]
pub struct BusChannels {
    name: BusName,
    ids: EventIds,
    pub events: mpsc::Sender<Event>,
    pub replies: mpsc::Receiver<Reply>,
    pub errors: mpsc::Sender<HubError>,
}

impl BusChannels {
    pub fn new(
        name: BusName,
        ids: EventIds,
        events: mpsc::Sender<Event>,
        replies: mpsc::Receiver<Reply>,
        errors: mpsc::Sender<HubError>,
    ) -> Self {
        Self {
            name,
            ids,
            events,
            replies,
            errors,
        }
    }

    pub fn bus_name(&self) -> &BusName {
        &self.name
    }

    /// Wrap platform input as a fresh event from this bus.
    pub fn new_event(&self, text: impl Into<String>, address: Address) -> Event {
        Event::new(self.ids.next_id(), self.name.clone(), text, address)
    }

    /// Hand an event to the hub.
    ///
    /// Waits for the hub to accept it, but never past cancellation, in which
    /// case the shutdown sentinel is returned.
    pub async fn publish(&self, cancel: &CancellationToken, event: Event) -> Result<(), HubError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(HubError::ShuttingDown),
            sent = self.events.send(event) => sent.map_err(|_| HubError::ShuttingDown),
        }
    }

    /// Report a non-fatal error. Dropped (with a log line) if the hub is gone.
    pub async fn report(&self, err: HubError) {
        if self.errors.send(err).await.is_err() {
            warn!(bus = %self.name, "error sink closed, dropping error");
        }
    }
}

/// What a reactor receives from the hub: its own inbound event channel, the
/// shared outbound reply channel, and the shared non-fatal error sink.
#[derive(Debug)]
pub struct ReactorChannels {
    pub events: mpsc::Receiver<Event>,
    pub replies: mpsc::Sender<Reply>,
    pub errors: mpsc::Sender<HubError>,
}

impl ReactorChannels {
    pub fn new(
        events: mpsc::Receiver<Event>,
        replies: mpsc::Sender<Reply>,
        errors: mpsc::Sender<HubError>,
    ) -> Self {
        Self {
            events,
            replies,
            errors,
        }
    }

    /// Push a reply to the hub, giving up on cancellation.
    pub async fn send_reply(&self, cancel: &CancellationToken, reply: Reply) -> Result<(), HubError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(HubError::ShuttingDown),
            sent = self.replies.send(reply) => sent.map_err(|_| HubError::ShuttingDown),
        }
    }

    pub async fn report(&self, err: HubError) {
        if self.errors.send(err).await.is_err() {
            warn!("error sink closed, dropping error");
        }
    }
}
