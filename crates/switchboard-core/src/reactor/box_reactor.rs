//! BoxReactor -- object-safe dynamic dispatch wrapper for Reactor.
//!
//! Same blanket-impl pattern as `BoxBus`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use switchboard_types::error::HubError;
use tokio_util::sync::CancellationToken;

use super::Reactor;
use crate::hub::ReactorChannels;

/// Object-safe version of [`Reactor`] with a boxed future.
pub trait ReactorDyn: Send + Sync {
    fn run_boxed(
        &self,
        cancel: CancellationToken,
        channels: ReactorChannels,
    ) -> Pin<Box<dyn Future<Output = Result<(), HubError>> + Send + '_>>;
}

impl<T: Reactor> ReactorDyn for T {
    fn run_boxed(
        &self,
        cancel: CancellationToken,
        channels: ReactorChannels,
    ) -> Pin<Box<dyn Future<Output = Result<(), HubError>> + Send + '_>> {
        Box::pin(self.run(cancel, channels))
    }
}

/// Type-erased reactor. Cloning shares the underlying reactor.
#[derive(Clone)]
pub struct BoxReactor {
    inner: Arc<dyn ReactorDyn>,
}

impl BoxReactor {
    pub fn new<T: Reactor + 'static>(reactor: T) -> Self {
        Self {
            inner: Arc::new(reactor),
        }
    }

    pub async fn run(
        &self,
        cancel: CancellationToken,
        channels: ReactorChannels,
    ) -> Result<(), HubError> {
        self.inner.run_boxed(cancel, channels).await
    }
}

impl std::fmt::Debug for BoxReactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxReactor").finish_non_exhaustive()
    }
}
