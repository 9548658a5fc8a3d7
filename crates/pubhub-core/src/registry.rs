//! Subscriber registry: the hub's only mutable collection.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use pubhub_common::ConnectionId;

use crate::connection::Connection;
use crate::subscriber::Subscriber;

/// Insertion-ordered set of subscribers keyed by [`ConnectionId`].
///
/// Every operation takes the lock for a short, non-blocking critical section.
/// The lock is never held across a send.
#[derive(Default)]
pub struct SubscriberRegistry {
    entries: Mutex<Vec<Subscriber>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Every mutation leaves the Vec valid, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `connection` under `name`, replacing any record for the same
    /// connection. The replacement moves to the end of the order.
    pub fn upsert(&self, connection: Arc<dyn Connection>, name: impl Into<String>) {
        let subscriber = Subscriber::new(connection, name);
        let mut entries = self.lock();
        entries.retain(|s| s != &subscriber);
        entries.push(subscriber);
    }

    /// Remove the record for `id`. Returns false if there was none.
    pub fn remove(&self, id: ConnectionId) -> bool {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|s| s.id() != id);
        entries.len() != before
    }

    /// Drop every record whose connection reports closed. Returns how many
    /// were removed.
    pub fn prune_closed(&self) -> usize {
        let mut entries = self.lock();
        Self::prune_locked(&mut entries)
    }

    /// Independent copy of the current records.
    pub fn snapshot(&self) -> Vec<Subscriber> {
        self.lock().clone()
    }

    /// Prune then snapshot inside a single critical section.
    pub fn prune_and_snapshot(&self) -> (usize, Vec<Subscriber>) {
        let mut entries = self.lock();
        let pruned = Self::prune_locked(&mut entries);
        (pruned, entries.clone())
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.lock().iter().any(|s| s.id() == id)
    }

    pub fn name_of(&self, id: ConnectionId) -> Option<String> {
        self.lock()
            .iter()
            .find(|s| s.id() == id)
            .map(|s| s.name().to_string())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn prune_locked(entries: &mut Vec<Subscriber>) -> usize {
        let before = entries.len();
        entries.retain(Subscriber::is_open);
        before - entries.len()
    }
}
