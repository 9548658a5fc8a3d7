//! Publish coordinator: the hub's public face.

use std::sync::Arc;
use std::time::Duration;

use pubhub_common::{ConnectionId, RegistrationError};
use pubhub_config::HubConfig;
use tokio::runtime::Handle;
use tracing::{debug, error, warn};

use crate::broadcast::{BroadcastExecutor, BroadcastHandle};
use crate::connection::CallerContext;
use crate::gate::SerialGate;
use crate::registry::SubscriberRegistry;
use crate::report::{ErrorHook, ErrorReport, TracingHook};

/// Long-lived broadcast hub shared by the subscription and publishing paths.
///
/// Cloning is cheap and every clone drives the same registry and gate.
///
/// # Serialization
///
/// [`publish_serial`](Self::publish_serial) waits for the gate, so two
/// serialized publishes never overlap. [`publish`](Self::publish) only resets
/// the gate without waiting for it: a direct `publish` running alongside a
/// serialized one is not excluded, and whichever broadcast finishes first
/// re-opens the gate. Callers that need mutual exclusion must publish
/// through `publish_serial` only.
#[derive(Clone)]
pub struct PublishCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    registry: SubscriberRegistry,
    gate: Arc<SerialGate>,
    executor: BroadcastExecutor,
    hook: Arc<dyn ErrorHook>,
    serial_max_wait: Duration,
    runtime: Option<Handle>,
}

/// Re-opens the gate when dropped. Created before dispatch and moved into the
/// broadcast task, so every exit from `publish` releases it.
struct GateRelease(Arc<SerialGate>);

impl Drop for GateRelease {
    fn drop(&mut self) {
        self.0.set();
    }
}

impl PublishCoordinator {
    /// Coordinator that reports errors through [`TracingHook`].
    pub fn new(config: &HubConfig) -> Self {
        Self::with_error_hook(config, Arc::new(TracingHook))
    }

    /// Broadcasts run on the runtime current at construction, if any.
    pub fn with_error_hook(config: &HubConfig, hook: Arc<dyn ErrorHook>) -> Self {
        Self::build(config, hook, Handle::try_current().ok())
    }

    /// Coordinator whose broadcasts always run on `runtime`, so `publish`
    /// can be called from threads outside it.
    pub fn with_runtime(config: &HubConfig, hook: Arc<dyn ErrorHook>, runtime: Handle) -> Self {
        Self::build(config, hook, Some(runtime))
    }

    fn build(config: &HubConfig, hook: Arc<dyn ErrorHook>, runtime: Option<Handle>) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: SubscriberRegistry::new(),
                gate: Arc::new(SerialGate::new()),
                executor: BroadcastExecutor::new(Arc::clone(&hook)),
                hook,
                serial_max_wait: config.serial_publish_max_wait(),
                runtime,
            }),
        }
    }

    /// Register the caller's connection under `name`.
    ///
    /// A second subscribe from the same connection replaces the first. Fails
    /// if the transport cannot supply an open callback channel; the failure
    /// is reported to the error hook and returned.
    pub fn subscribe<C>(&self, caller: &C, name: &str) -> Result<ConnectionId, RegistrationError>
    where
        C: CallerContext + ?Sized,
    {
        let connection = caller.callback_channel().and_then(|connection| {
            if connection.is_open() {
                Ok(connection)
            } else {
                Err(RegistrationError::ChannelClosed(connection.id()))
            }
        });

        let connection = match connection {
            Ok(connection) => connection,
            Err(error) => {
                self.inner.hook.report(&ErrorReport::Registration {
                    name: name.to_string(),
                    error: error.clone(),
                });
                return Err(error);
            }
        };

        let id = connection.id();
        self.inner.registry.upsert(connection, name);
        debug!(subscriber = %name, connection = %id, "Subscriber registered");
        Ok(id)
    }

    /// Remove the caller's registration. Never fails.
    pub fn unsubscribe<C>(&self, caller: &C)
    where
        C: CallerContext + ?Sized,
    {
        match caller.callback_channel() {
            Ok(connection) => self.unsubscribe_id(connection.id()),
            Err(error) => {
                warn!(error = %error, "Unsubscribe from a caller without a callback channel");
            }
        }
    }

    /// Remove the registration for `id`. An unknown id is only a warning.
    pub fn unsubscribe_id(&self, id: ConnectionId) {
        if self.inner.registry.remove(id) {
            debug!(connection = %id, "Subscriber unregistered");
        } else {
            warn!(connection = %id, "Unsubscribe requested for unknown connection");
        }
    }

    /// Broadcast `data` to every live subscriber without waiting for delivery.
    ///
    /// Closed connections are pruned first. Safe to call from any thread:
    /// the broadcast runs on the coordinator's runtime, or the caller's when
    /// it was built outside one. With neither, nothing is sent and an error
    /// is logged. The returned handle may be dropped.
    pub fn publish(&self, data: impl Into<Arc<str>>) -> BroadcastHandle {
        let payload: Arc<str> = data.into();
        self.inner.gate.reset();
        let release = GateRelease(Arc::clone(&self.inner.gate));

        let (pruned, snapshot) = self.inner.registry.prune_and_snapshot();
        if pruned > 0 {
            debug!(pruned, "Pruned closed subscribers");
        }

        if snapshot.is_empty() {
            return BroadcastHandle::idle();
        }

        let runtime = match self.inner.runtime.clone().or_else(|| Handle::try_current().ok()) {
            Some(runtime) => runtime,
            None => {
                error!(
                    subscribers = snapshot.len(),
                    "No tokio runtime available, broadcast dropped"
                );
                return BroadcastHandle::idle();
            }
        };

        let inner = Arc::clone(&self.inner);
        let task = runtime.spawn(async move {
            let _release = release;
            let summary = inner.executor.run(snapshot, payload).await;
            debug!(
                attempted = summary.attempted,
                delivered = summary.delivered,
                failed = summary.failed,
                "Finished publishing to all subscribers"
            );
            summary
        });
        BroadcastHandle::running(task)
    }

    /// Wait up to `max_wait` for the previous serialized broadcast to finish,
    /// then [`publish`](Self::publish). Returns `None` on timeout, in which
    /// case nothing was published.
    pub async fn publish_serial(
        &self,
        data: impl Into<Arc<str>>,
        max_wait: Duration,
    ) -> Option<BroadcastHandle> {
        if !self.inner.gate.acquire(max_wait).await {
            debug!(?max_wait, "Timed out waiting for previous publish");
            return None;
        }
        Some(self.publish(data))
    }

    /// [`publish_serial`](Self::publish_serial) with the configured default wait.
    pub async fn publish_serial_default(
        &self,
        data: impl Into<Arc<str>>,
    ) -> Option<BroadcastHandle> {
        self.publish_serial(data, self.inner.serial_max_wait).await
    }

    /// Registered subscribers, including any not yet pruned.
    pub fn subscriber_count(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn subscriber_names(&self) -> Vec<String> {
        self.inner
            .registry
            .snapshot()
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    pub fn is_subscribed(&self, id: ConnectionId) -> bool {
        self.inner.registry.contains(id)
    }

    /// True when no broadcast holds the gate.
    pub fn is_idle(&self) -> bool {
        self.inner.gate.is_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use crate::test_support::{MockConnection, RecordingHook};

    fn coordinator_with_hook() -> (PublishCoordinator, Arc<RecordingHook>) {
        let hook = Arc::new(RecordingHook::default());
        let hub = PublishCoordinator::with_error_hook(&HubConfig::default(), hook.clone());
        (hub, hook)
    }

    #[test]
    fn resubscribe_keeps_latest_name() {
        let (hub, _) = coordinator_with_hook();
        let conn = MockConnection::arc();

        for name in ["a", "b", "c"] {
            hub.subscribe(&conn, name).unwrap();
        }

        assert_eq!(hub.subscriber_count(), 1);
        assert_eq!(hub.subscriber_names(), vec!["c".to_string()]);
    }

    #[test]
    fn subscribe_without_callback_fails_and_reports() {
        let (hub, hook) = coordinator_with_hook();
        let caller: Option<Arc<MockConnection>> = None;

        let err = hub.subscribe(&caller, "ghost").unwrap_err();

        assert_eq!(err, RegistrationError::NoCallbackChannel);
        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(
            hook.reports(),
            vec![ErrorReport::Registration {
                name: "ghost".into(),
                error: RegistrationError::NoCallbackChannel,
            }]
        );
    }

    #[test]
    fn subscribe_closed_channel_fails() {
        let (hub, _) = coordinator_with_hook();
        let conn = MockConnection::arc();
        conn.close();

        let err = hub.subscribe(&conn, "late").unwrap_err();
        assert_eq!(err, RegistrationError::ChannelClosed(conn.id()));
    }

    #[test]
    fn unsubscribe_removes_and_tolerates_unknown() {
        let (hub, hook) = coordinator_with_hook();
        let conn = MockConnection::arc();
        let id = hub.subscribe(&conn, "x").unwrap();
        assert!(hub.is_subscribed(id));

        hub.unsubscribe(&conn);
        hub.unsubscribe(&conn);
        hub.unsubscribe(&None::<Arc<MockConnection>>);

        assert!(!hub.is_subscribed(id));
        assert!(hook.reports().is_empty());
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_is_a_no_op() {
        let (hub, _) = coordinator_with_hook();
        let handle = hub.publish("nobody");
        assert!(handle.is_finished());
        assert!(hub.is_idle());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn publish_delivers_and_reopens_gate() {
        let (hub, _) = coordinator_with_hook();
        let conns: Vec<_> = (0..20).map(|_| MockConnection::arc()).collect();
        for (i, c) in conns.iter().enumerate() {
            hub.subscribe(c, &i.to_string()).unwrap();
        }

        let summary = hub.publish("Roman").finished().await;

        assert_eq!(summary.delivered, 20);
        assert!(hub.is_idle());
        for c in &conns {
            assert_eq!(c.received(), vec!["Roman".to_string()]);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn publish_returns_before_delivery_finishes() {
        let (hub, _) = coordinator_with_hook();
        let slow = MockConnection::slow(Duration::from_millis(200));
        hub.subscribe(&slow, "slow").unwrap();

        let handle = hub.publish("later");

        assert!(!handle.is_finished());
        assert!(!hub.is_idle());
        assert!(slow.received().is_empty());

        handle.finished().await;
        assert_eq!(slow.received(), vec!["later".to_string()]);
        assert!(hub.is_idle());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn publish_prunes_closed_connections() {
        let (hub, _) = coordinator_with_hook();
        let open = MockConnection::arc();
        let closed = MockConnection::arc();
        hub.subscribe(&open, "open").unwrap();
        hub.subscribe(&closed, "closed").unwrap();
        closed.close();

        let summary = hub.publish("x").finished().await;

        assert_eq!(summary.attempted, 1);
        assert_eq!(hub.subscriber_count(), 1);
        assert!(closed.received().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn failing_subscriber_does_not_block_others() {
        let (hub, hook) = coordinator_with_hook();
        let good = MockConnection::arc();
        let bad = MockConnection::failing();
        hub.subscribe(&good, "good").unwrap();
        hub.subscribe(&bad, "bad").unwrap();

        let summary = hub.publish("x").finished().await;

        assert_eq!(summary.delivered, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(good.received(), vec!["x".to_string()]);
        assert_eq!(hook.delivery_names(), vec!["bad".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn serial_publish_times_out_while_previous_in_flight() {
        let (hub, _) = coordinator_with_hook();
        let slow = MockConnection::slow(Duration::from_millis(300));
        hub.subscribe(&slow, "slow").unwrap();

        let first = hub
            .publish_serial("first", Duration::from_millis(10))
            .await
            .expect("gate starts available");
        let second = hub.publish_serial("second", Duration::from_millis(50)).await;

        assert!(second.is_none());
        first.finished().await;
        assert_eq!(slow.received(), vec!["first".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn serial_publish_waits_for_previous_broadcast() {
        let (hub, _) = coordinator_with_hook();
        let slow = MockConnection::slow(Duration::from_millis(100));
        hub.subscribe(&slow, "slow").unwrap();

        let first = hub.publish("first");
        let second = hub
            .publish_serial("second", Duration::from_secs(5))
            .await
            .expect("gate re-opens after first broadcast");

        first.finished().await;
        second.finished().await;
        assert_eq!(
            slow.received(),
            vec!["first".to_string(), "second".to_string()]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn serial_publishes_never_overlap() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct OverlapCounter {
            id: ConnectionId,
            in_flight: AtomicUsize,
            max_seen: AtomicUsize,
        }

        #[async_trait::async_trait]
        impl Connection for OverlapCounter {
            fn id(&self) -> ConnectionId {
                self.id
            }
            fn is_open(&self) -> bool {
                true
            }
            async fn send(&self, _payload: &str) -> Result<(), pubhub_common::DeliveryError> {
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let (hub, _) = coordinator_with_hook();
        let counter = Arc::new(OverlapCounter {
            id: ConnectionId::new(),
            in_flight: AtomicUsize::new(0),
            max_seen: AtomicUsize::new(0),
        });
        hub.subscribe(&counter, "counter").unwrap();

        let publishers: Vec<_> = (0..5)
            .map(|i| {
                let hub = hub.clone();
                tokio::spawn(async move {
                    hub.publish_serial(format!("msg-{i}"), Duration::from_secs(5))
                        .await
                        .is_some()
                })
            })
            .collect();
        for p in publishers {
            assert!(p.await.unwrap());
        }
        // Let the last broadcast drain.
        assert!(
            hub.publish_serial("drain", Duration::from_secs(5))
                .await
                .is_some()
        );

        assert_eq!(counter.max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn serial_default_uses_configured_wait() {
        let hook = Arc::new(RecordingHook::default());
        let config = HubConfig {
            serial_publish_max_wait_ms: 20,
        };
        let hub = PublishCoordinator::with_error_hook(&config, hook);
        let slow = MockConnection::slow(Duration::from_millis(500));
        hub.subscribe(&slow, "slow").unwrap();

        let _first = hub.publish("first");
        assert!(hub.publish_serial_default("second").await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn direct_publish_overlaps_serial_and_first_finisher_reopens_gate() {
        let (hub, _) = coordinator_with_hook();
        let slow = MockConnection::slow(Duration::from_millis(400));
        let quick = MockConnection::slow(Duration::from_millis(50));
        hub.subscribe(&slow, "slow").unwrap();

        let serial = hub
            .publish_serial("serial", Duration::from_millis(10))
            .await
            .expect("gate starts available");

        // The direct publish goes out while the serialized one is still running.
        hub.unsubscribe(&slow);
        hub.subscribe(&quick, "quick").unwrap();
        let direct = hub.publish("direct");
        assert!(!direct.is_finished());
        assert!(!serial.is_finished());

        let waiter = {
            let hub = hub.clone();
            tokio::spawn(async move { hub.publish_serial("next", Duration::from_secs(5)).await })
        };

        direct.finished().await;
        assert_eq!(quick.received(), vec!["direct".to_string()]);

        let next = waiter
            .await
            .unwrap()
            .expect("first broadcast to finish re-opens the gate");
        assert!(!serial.is_finished());
        assert!(slow.received().is_empty());

        next.finished().await;
        serial.finished().await;
        assert_eq!(slow.received(), vec!["serial".to_string()]);
        assert_eq!(
            quick.received(),
            vec!["direct".to_string(), "next".to_string()]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn publish_from_plain_thread_runs_on_hub_runtime() {
        let (hub, _) = coordinator_with_hook();
        let conn = MockConnection::arc();
        hub.subscribe(&conn, "remote").unwrap();

        let remote = hub.clone();
        let handle = std::thread::spawn(move || remote.publish("from-thread"))
            .join()
            .expect("publish off the runtime must not panic");
        assert_eq!(handle.finished().await.delivered, 1);

        let after = hub
            .publish_serial("after", Duration::from_millis(500))
            .await
            .expect("gate re-opened after off-runtime publish");
        after.finished().await;
        assert_eq!(
            conn.received(),
            vec!["from-thread".to_string(), "after".to_string()]
        );
    }

    #[test]
    fn with_runtime_dispatches_on_the_given_runtime() {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        let hub = PublishCoordinator::with_runtime(
            &HubConfig::default(),
            Arc::new(RecordingHook::default()),
            rt.handle().clone(),
        );
        let conn = MockConnection::arc();
        hub.subscribe(&conn, "hosted").unwrap();

        let handle = hub.publish("hosted");
        assert_eq!(rt.block_on(handle.finished()).delivered, 1);
        assert!(rt
            .block_on(hub.publish_serial("again", Duration::from_millis(500)))
            .is_some());
    }

    #[test]
    fn publish_without_any_runtime_keeps_gate_open() {
        let (hub, _) = coordinator_with_hook();
        let conn = MockConnection::arc();
        hub.subscribe(&conn, "stranded").unwrap();

        let handle = hub.publish("lost");

        assert!(handle.is_finished());
        assert!(hub.is_idle());
        assert!(conn.received().is_empty());
        assert_eq!(hub.subscriber_count(), 1);
    }
}
