//! Concurrent fan-out of one payload to a subscriber snapshot.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use pubhub_common::DeliveryError;
use tokio::task::{JoinHandle, JoinSet};

use crate::report::{ErrorHook, ErrorReport};
use crate::subscriber::Subscriber;

/// Outcome counts for one broadcast.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastSummary {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Delivers a payload to every subscriber of a snapshot concurrently.
///
/// Each send runs as its own task on the runtime's worker pool. A failing or
/// panicking send is reported through the [`ErrorHook`] with the
/// subscriber's name and never affects the other deliveries.
pub struct BroadcastExecutor {
    hook: Arc<dyn ErrorHook>,
}

impl BroadcastExecutor {
    pub fn new(hook: Arc<dyn ErrorHook>) -> Self {
        Self { hook }
    }

    /// Resolves once every delivery attempt has finished.
    pub async fn run(&self, snapshot: Vec<Subscriber>, payload: Arc<str>) -> BroadcastSummary {
        let mut summary = BroadcastSummary {
            attempted: snapshot.len(),
            ..Default::default()
        };

        let mut set = JoinSet::new();
        for subscriber in snapshot {
            let payload = Arc::clone(&payload);
            set.spawn(async move {
                let send = subscriber.connection().send(&payload);
                let result = match AssertUnwindSafe(send).catch_unwind().await {
                    Ok(result) => result,
                    Err(panic) => Err(DeliveryError::Panicked(panic_message(panic.as_ref()))),
                };
                (subscriber, result)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, Ok(()))) => summary.delivered += 1,
                Ok((subscriber, Err(error))) => {
                    summary.failed += 1;
                    self.hook.report(&ErrorReport::Delivery {
                        name: subscriber.name().to_string(),
                        connection: subscriber.id(),
                        error,
                    });
                }
                Err(e) => {
                    // Only reachable if the runtime cancels the task.
                    summary.failed += 1;
                    tracing::warn!(error = %e, "Delivery task did not complete");
                }
            }
        }

        summary
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Handle to a dispatched broadcast.
///
/// Dropping it detaches the broadcast; it keeps running to completion.
#[must_use = "drop the handle to fire and forget, or await `finished()`"]
pub struct BroadcastHandle {
    task: Option<JoinHandle<BroadcastSummary>>,
}

impl BroadcastHandle {
    pub(crate) fn idle() -> Self {
        Self { task: None }
    }

    pub(crate) fn running(task: JoinHandle<BroadcastSummary>) -> Self {
        Self { task: Some(task) }
    }

    /// True once every delivery attempt has finished.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the broadcast to complete.
    pub async fn finished(self) -> BroadcastSummary {
        let Some(task) = self.task else {
            return BroadcastSummary::default();
        };
        match task.await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(error = %e, "Broadcast task did not complete");
                BroadcastSummary::default()
            }
        }
    }
}
