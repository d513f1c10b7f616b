//! The `Reactor` capability and the built-in reactors.
//!
//! - `box_reactor` -- `BoxReactor`, object-safe wrapper
//! - `echo` -- replies with the event text, optionally upper-cased
//! - `uptime` -- reports how long the reactor has been running
//! - `eject` -- replies and then stops the whole hub on a keyword

pub mod box_reactor;
pub mod echo;
pub mod eject;
pub mod uptime;

use std::future::Future;

use switchboard_types::error::HubError;
use tokio_util::sync::CancellationToken;

use crate::hub::ReactorChannels;

pub use box_reactor::BoxReactor;
pub use echo::EchoReactor;
pub use eject::EjectReactor;
pub use uptime::UptimeReactor;

/// A consumer of events that may produce replies.
///
/// `run` receives every event the hub dispatches. It returns
/// [`HubError::ShuttingDown`] to stop the hub cleanly, any other error to
/// fail it, or `Ok(())` to simply finish.
pub trait Reactor: Send + Sync {
    fn run(
        &self,
        cancel: CancellationToken,
        channels: ReactorChannels,
    ) -> impl Future<Output = Result<(), HubError>> + Send;
}
