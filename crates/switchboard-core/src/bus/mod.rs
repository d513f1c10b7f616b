//! The `Bus` capability: one external endpoint adapted to the hub's
//! event/reply contract.
//!
//! - `box_bus` -- `BoxBus`, object-safe wrapper for runtime bus selection

pub mod box_bus;

use std::future::Future;

use switchboard_types::error::HubError;
use switchboard_types::hub::{Address, BusName};
use tokio_util::sync::CancellationToken;

use crate::hub::BusChannels;

pub use box_bus::BoxBus;

/// An adapter between one external messaging endpoint and the hub.
///
/// `run` must park on cancellation (returning [`HubError::ShuttingDown`]),
/// inbound replies (transmitting them to the platform), and platform input
/// (wrapping it as an event and publishing it). It must never silently drop
/// a reply or a platform message.
///
/// Uses native async fn in traits (RPITIT, no async_trait macro). Use
/// [`BoxBus`] for dynamic dispatch.
pub trait Bus: Send + Sync {
    fn name(&self) -> &BusName;

    fn run(
        &self,
        cancel: CancellationToken,
        channels: BusChannels,
    ) -> impl Future<Output = Result<(), HubError>> + Send;

    /// Transmit text straight to the platform, bypassing the hub.
    fn send_message(
        &self,
        address: &Address,
        text: &str,
    ) -> impl Future<Output = Result<(), HubError>> + Send;
}
