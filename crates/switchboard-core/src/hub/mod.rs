//! The event hub: owns every channel, fans events out to reactors, routes
//! replies back to their bus, and arms the fallback watchdog.
//!
//! - `channels` -- `BusChannels` / `ReactorChannels` handed to components
//! - `router` -- routing tables touched only by the dispatch loop
//!
//! Every bus and reactor runs as its own task under a child of the hub's
//! root cancellation token. The first task to return an error cancels that
//! scope; everyone else observes cancellation and unwinds.

pub mod channels;
pub mod router;

use std::collections::HashMap;

use switchboard_types::error::HubError;
use switchboard_types::hub::{BusName, ReactorName, Reply};
use tokio::sync::mpsc;
use tokio::task::{Id, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bus::BoxBus;
use crate::event::{Event, EventIds};
use crate::reactor::BoxReactor;

pub use channels::{BusChannels, ReactorChannels};
pub use router::{Routed, Router};

/// Buffer of the shared bus -> hub event channel.
const EVENT_BUFFER: usize = 64;
/// Buffer of the shared reactor -> hub reply channel.
const REPLY_BUFFER: usize = 64;
/// Buffer of the shared error sink.
const ERROR_BUFFER: usize = 64;
/// Buffer of each hub -> bus reply channel.
const BUS_REPLY_BUFFER: usize = 16;
/// Each reactor gets a single-slot channel so fan-out waits on it.
const REACTOR_EVENT_BUFFER: usize = 1;

type TaskOutcome = Result<(), HubError>;

/// Central router between buses and reactors.
///
/// Components are fixed before [`EventHub::run`]; `run` consumes the hub.
#[derive(Debug)]
pub struct EventHub {
    name: String,
    buses: Vec<BoxBus>,
    reactors: Vec<(ReactorName, BoxReactor)>,
    ids: EventIds,
    cancel: CancellationToken,
}

impl EventHub {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            buses: Vec::new(),
            reactors: Vec::new(),
            ids: EventIds::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a bus. Bus names must be unique since replies are routed
    /// by name.
    pub fn add_bus(&mut self, bus: BoxBus) -> Result<(), HubError> {
        if self.buses.iter().any(|b| b.name() == bus.name()) {
            return Err(HubError::DuplicateName(bus.name().to_string()));
        }
        self.buses.push(bus);
        Ok(())
    }

    pub fn add_reactor(&mut self, name: ReactorName, reactor: BoxReactor) -> Result<(), HubError> {
        if self.reactors.iter().any(|(n, _)| *n == name) {
            return Err(HubError::DuplicateName(name.to_string()));
        }
        self.reactors.push((name, reactor));
        Ok(())
    }

    pub fn bus_names(&self) -> impl Iterator<Item = &BusName> {
        self.buses.iter().map(BoxBus::name)
    }

    pub fn reactor_names(&self) -> impl Iterator<Item = &ReactorName> {
        self.reactors.iter().map(|(name, _)| name)
    }

    /// Root token. Cancelling it stops the hub cleanly.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run until every component has exited or the root token fires.
    ///
    /// Returns the first non-shutdown error any component produced. A stop
    /// caused by cancellation or by a component returning
    /// [`HubError::ShuttingDown`] yields that sentinel. If every component
    /// simply finishes, `Ok(())` is returned.
    pub async fn run(self) -> Result<(), HubError> {
        let EventHub {
            name,
            buses,
            reactors,
            ids,
            cancel,
        } = self;
        let scope = cancel.child_token();

        let (events_tx, mut events_rx) = mpsc::channel::<Event>(EVENT_BUFFER);
        let (replies_tx, mut replies_rx) = mpsc::channel::<Reply>(REPLY_BUFFER);
        let (errors_tx, mut errors_rx) = mpsc::channel::<HubError>(ERROR_BUFFER);

        let mut router = Router::new();
        let mut tasks: JoinSet<TaskOutcome> = JoinSet::new();
        let mut task_names: HashMap<Id, String> = HashMap::new();

        for bus in buses {
            let bus_name = bus.name().clone();
            let (bus_replies_tx, bus_replies_rx) = mpsc::channel(BUS_REPLY_BUFFER);
            router.add_bus(bus_name.clone(), bus_replies_tx);

            let channels = BusChannels::new(
                bus_name.clone(),
                ids.clone(),
                events_tx.clone(),
                bus_replies_rx,
                errors_tx.clone(),
            );
            let token = scope.clone();
            let handle = tasks.spawn(async move { bus.run(token, channels).await });
            task_names.insert(handle.id(), format!("bus '{bus_name}'"));
        }

        for (reactor_name, reactor) in reactors {
            let (reactor_events_tx, reactor_events_rx) = mpsc::channel(REACTOR_EVENT_BUFFER);
            router.add_reactor(reactor_name.clone(), reactor_events_tx);

            let channels = ReactorChannels::new(reactor_events_rx, replies_tx.clone(), errors_tx.clone());
            let token = scope.clone();
            let handle = tasks.spawn(async move { reactor.run(token, channels).await });
            task_names.insert(handle.id(), format!("reactor '{reactor_name}'"));
        }

        // Components hold their own clones; the hub keeps `replies_tx` only
        // for arming fallbacks.
        drop(events_tx);
        drop(errors_tx);

        info!(hub = %name, tasks = tasks.len(), "event hub started");

        let mut first_error: Option<HubError> = None;
        let mut events_open = true;
        let mut errors_open = true;

        loop {
            tokio::select! {
                event = events_rx.recv(), if events_open && !scope.is_cancelled() => {
                    let Some(event) = event else {
                        events_open = false;
                        continue;
                    };
                    debug!(event_id = event.id(), bus = %event.source_bus, "dispatching event");
                    event.arm_fallback(replies_tx.clone());
                    if let Err(err) = router.fan_out(&scope, &event).await {
                        debug!(event_id = event.id(), error = %err, "fan-out interrupted");
                    }
                }
                Some(reply) = replies_rx.recv(), if !scope.is_cancelled() => {
                    debug!(event_id = reply.event_id, bus = %reply.bus, "routing reply");
                    if let Err(err) = router.route(&scope, reply).await {
                        debug!(error = %err, "reply routing interrupted");
                    }
                }
                err = errors_rx.recv(), if errors_open => {
                    match err {
                        Some(err) => warn!(error = %err, "component reported an error"),
                        None => errors_open = false,
                    }
                }
                joined = tasks.join_next_with_id() => {
                    let Some(joined) = joined else { break };
                    let (task, outcome) = match joined {
                        Ok((id, outcome)) => (task_names.remove(&id).unwrap_or_default(), outcome),
                        Err(join_err) => {
                            let task = task_names.remove(&join_err.id()).unwrap_or_default();
                            (task.clone(), Err(HubError::Panicked(task)))
                        }
                    };

                    match outcome {
                        Ok(()) => debug!(task = %task, "component finished"),
                        Err(HubError::ShuttingDown) => {
                            info!(task = %task, "component stopped");
                            scope.cancel();
                        }
                        Err(err) => {
                            error!(task = %task, error = %err, "component failed, stopping hub");
                            first_error.get_or_insert(err);
                            scope.cancel();
                        }
                    }
                }
            }
        }

        info!(hub = %name, "event hub stopped");

        match first_error {
            Some(err) => Err(err),
            None if scope.is_cancelled() => Err(HubError::ShuttingDown),
            None => Ok(()),
        }
    }
}
