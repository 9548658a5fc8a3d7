//! pubhub-core: in-process publish/subscribe broadcast hub.
//!
//! A single long-lived [`PublishCoordinator`] tracks connected subscribers
//! and fans each published message out to all of them concurrently.
//!
//! ```text
//! subscribe(caller, name) ──► SubscriberRegistry (upsert by ConnectionId)
//!
//! publish(data)
//!   ├─► gate.reset()
//!   ├─► registry: prune closed + snapshot   (one short critical section)
//!   └─► tokio::spawn ──► BroadcastExecutor ──┬─► conn1.send(data)
//!                             │              ├─► conn2.send(data)
//!                             │              └─► connN.send(data)
//!                             └─► gate.set() once every attempt finished
//!
//! publish_serial(data, max_wait) = gate.acquire(max_wait) then publish(data)
//! ```
//!
//! Failures to deliver to one subscriber are reported through an
//! [`ErrorHook`] and never reach the publisher or other subscribers.

mod broadcast;
mod connection;
mod coordinator;
mod gate;
mod registry;
mod report;
mod subscriber;

#[cfg(test)]
pub(crate) mod test_support;

pub use broadcast::{BroadcastExecutor, BroadcastHandle, BroadcastSummary};
pub use connection::{CallerContext, Connection};
pub use coordinator::PublishCoordinator;
pub use gate::SerialGate;
pub use registry::SubscriberRegistry;
pub use report::{ErrorHook, ErrorReport, TracingHook};
pub use subscriber::Subscriber;

pub use pubhub_common::{ConnectionId, DeliveryError, RegistrationError};
