//! One-shot completion signal and per-hub event id generator.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

/// First-writer-wins completion signal shared by every clone of an event.
///
/// `complete()` returns `true` only for the caller that actually fired the
/// signal; every later call observes "already completed" and returns `false`.
/// Waiters blocked in `done()` are released exactly once.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    fired: Arc<AtomicBool>,
    token: CancellationToken,
}

impl Completion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. Returns `false` if it had already fired.
    pub fn complete(&self) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.token.cancel();
        true
    }

    pub fn is_complete(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Wait until the signal has fired.
    pub async fn done(&self) {
        self.token.cancelled().await;
    }
}

/// Monotonic event id generator owned by a single hub.
///
/// Cloning shares the counter, so every bus handed a clone draws from the
/// same sequence. Independent hubs never share state.
#[derive(Debug, Clone, Default)]
pub struct EventIds(Arc<AtomicU64>);

impl EventIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id. The first id issued is 1.
    pub fn next_id(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}
