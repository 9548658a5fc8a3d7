//! Auto-reset gate serializing `publish_serial` broadcasts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

/// Binary gate, initially available.
///
/// `acquire` consumes availability; `set` makes the gate available and wakes
/// one waiter; `reset` makes it unavailable without waiting. Only callers
/// that go through `acquire` are serialized against each other.
pub struct SerialGate {
    available: AtomicBool,
    notify: Notify,
}

impl SerialGate {
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            notify: Notify::new(),
        }
    }

    /// Mark unavailable. Idempotent.
    pub fn reset(&self) {
        self.available.store(false, Ordering::SeqCst);
    }

    /// Mark available and release one waiter.
    pub fn set(&self) {
        self.available.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Wait up to `max_wait` to take the gate. Returns false on timeout.
    pub async fn acquire(&self, max_wait: Duration) -> bool {
        tokio::time::timeout(max_wait, self.take()).await.is_ok()
    }

    fn try_take(&self) -> bool {
        self.available
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    async fn take(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a `set` between the check and the
            // await is not missed.
            notified.as_mut().enable();
            if self.try_take() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for SerialGate {
    fn default() -> Self {
        Self::new()
    }
}
