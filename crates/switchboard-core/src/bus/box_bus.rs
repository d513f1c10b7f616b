//! BoxBus -- object-safe dynamic dispatch wrapper for Bus.
//!
//! 1. `BusDyn` is an object-safe mirror of `Bus` with boxed futures
//! 2. Blanket-impl `BusDyn` for all `T: Bus`
//! 3. `BoxBus` wraps `Arc<dyn BusDyn>` and delegates

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use switchboard_types::error::HubError;
use switchboard_types::hub::{Address, BusName};
use tokio_util::sync::CancellationToken;

use super::Bus;
use crate::hub::BusChannels;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe version of [`Bus`] with boxed futures.
pub trait BusDyn: Send + Sync {
    fn name(&self) -> &BusName;

    fn run_boxed(
        &self,
        cancel: CancellationToken,
        channels: BusChannels,
    ) -> BoxFuture<'_, Result<(), HubError>>;

    fn send_message_boxed<'a>(
        &'a self,
        address: &'a Address,
        text: &'a str,
    ) -> BoxFuture<'a, Result<(), HubError>>;
}

impl<T: Bus> BusDyn for T {
    fn name(&self) -> &BusName {
        Bus::name(self)
    }

    fn run_boxed(
        &self,
        cancel: CancellationToken,
        channels: BusChannels,
    ) -> BoxFuture<'_, Result<(), HubError>> {
        Box::pin(self.run(cancel, channels))
    }

    fn send_message_boxed<'a>(
        &'a self,
        address: &'a Address,
        text: &'a str,
    ) -> BoxFuture<'a, Result<(), HubError>> {
        Box::pin(self.send_message(address, text))
    }
}

/// Type-erased bus. Cloning shares the underlying bus.
///
/// Since `Bus` uses RPITIT it cannot be a trait object directly; `BoxBus`
/// provides the same methods over `dyn BusDyn`.
#[derive(Clone)]
pub struct BoxBus {
    inner: Arc<dyn BusDyn>,
}

impl BoxBus {
    pub fn new<T: Bus + 'static>(bus: T) -> Self {
        Self {
            inner: Arc::new(bus),
        }
    }

    pub fn name(&self) -> &BusName {
        self.inner.name()
    }

    pub async fn run(
        &self,
        cancel: CancellationToken,
        channels: BusChannels,
    ) -> Result<(), HubError> {
        self.inner.run_boxed(cancel, channels).await
    }

    pub async fn send_message(&self, address: &Address, text: &str) -> Result<(), HubError> {
        self.inner.send_message_boxed(address, text).await
    }
}

impl std::fmt::Debug for BoxBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxBus")
            .field("name", self.inner.name())
            .finish()
    }
}
