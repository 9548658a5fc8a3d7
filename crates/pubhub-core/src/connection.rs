//! Transport-side contract consumed by the hub.

use std::sync::Arc;

use async_trait::async_trait;
use pubhub_common::{ConnectionId, DeliveryError, RegistrationError};

/// One subscriber's transport channel.
///
/// The hub only ever asks whether the channel is open and pushes payloads
/// through it. Handshakes, encoding and liveness detection belong to the
/// transport that implements this trait.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// Stable identity of the underlying connection.
    fn id(&self) -> ConnectionId;

    /// Best-effort liveness check. Must not block.
    fn is_open(&self) -> bool;

    /// Deliver one payload. Called from a broadcast worker, never from the
    /// publisher's task.
    async fn send(&self, payload: &str) -> Result<(), DeliveryError>;
}

/// Whatever the transport knows about the peer making a subscribe or
/// unsubscribe call.
pub trait CallerContext {
    /// The callback channel of the calling connection.
    fn callback_channel(&self) -> Result<Arc<dyn Connection>, RegistrationError>;
}

impl<C: Connection> CallerContext for Arc<C> {
    fn callback_channel(&self) -> Result<Arc<dyn Connection>, RegistrationError> {
        Ok(Arc::clone(self) as Arc<dyn Connection>)
    }
}

impl CallerContext for Arc<dyn Connection> {
    fn callback_channel(&self) -> Result<Arc<dyn Connection>, RegistrationError> {
        Ok(Arc::clone(self))
    }
}

/// A caller whose transport has no callback channel to offer.
impl<T: CallerContext> CallerContext for Option<T> {
    fn callback_channel(&self) -> Result<Arc<dyn Connection>, RegistrationError> {
        match self {
            Some(inner) => inner.callback_channel(),
            None => Err(RegistrationError::NoCallbackChannel),
        }
    }
}
