//! In-memory connection and hook doubles for unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pubhub_common::{ConnectionId, DeliveryError};

use crate::connection::Connection;
use crate::report::{ErrorHook, ErrorReport};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Behavior {
    Deliver,
    Fail,
    Panic,
}

pub(crate) struct MockConnection {
    id: ConnectionId,
    open: AtomicBool,
    behavior: Behavior,
    delay: Option<Duration>,
    received: Mutex<Vec<String>>,
}

impl MockConnection {
    fn build(behavior: Behavior, delay: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::new(),
            open: AtomicBool::new(true),
            behavior,
            delay,
            received: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn arc() -> Arc<Self> {
        Self::build(Behavior::Deliver, None)
    }

    pub(crate) fn failing() -> Arc<Self> {
        Self::build(Behavior::Fail, None)
    }

    pub(crate) fn panicking() -> Arc<Self> {
        Self::build(Behavior::Panic, None)
    }

    pub(crate) fn slow(delay: Duration) -> Arc<Self> {
        Self::build(Behavior::Deliver, Some(delay))
    }

    pub(crate) fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    pub(crate) fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn send(&self, payload: &str) -> Result<(), DeliveryError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.behavior {
            Behavior::Deliver if self.is_open() => {
                self.received.lock().unwrap().push(payload.to_string());
                Ok(())
            }
            Behavior::Deliver => Err(DeliveryError::Closed),
            Behavior::Fail => Err(DeliveryError::Transport("mock send failed".into())),
            Behavior::Panic => panic!("mock send panicked"),
        }
    }
}

#[derive(Default)]
pub(crate) struct RecordingHook {
    reports: Mutex<Vec<ErrorReport>>,
}

impl RecordingHook {
    pub(crate) fn reports(&self) -> Vec<ErrorReport> {
        self.reports.lock().unwrap().clone()
    }

    pub(crate) fn delivery_names(&self) -> Vec<String> {
        self.reports()
            .iter()
            .filter(|r| matches!(r, ErrorReport::Delivery { .. }))
            .map(|r| r.name().to_string())
            .collect()
    }
}

impl ErrorHook for RecordingHook {
    fn report(&self, report: &ErrorReport) {
        self.reports.lock().unwrap().push(report.clone());
    }
}
