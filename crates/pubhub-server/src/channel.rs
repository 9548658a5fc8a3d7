//! `Connection` implementation for one WebSocket peer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pubhub_common::{ConnectionId, DeliveryError};
use pubhub_core::Connection;
use tokio::sync::mpsc;

use crate::protocol::ServerMessage;

/// Outbound side of a peer: broadcast frames are queued here and drained by
/// the peer's socket writer.
pub struct WsChannel {
    id: ConnectionId,
    tx: mpsc::Sender<String>,
    open: AtomicBool,
    send_timeout: Duration,
}

impl WsChannel {
    pub fn new(capacity: usize, send_timeout: Duration) -> (Arc<Self>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let channel = Arc::new(Self {
            id: ConnectionId::new(),
            tx,
            open: AtomicBool::new(true),
            send_timeout,
        });
        (channel, rx)
    }

    /// Mark closed; the next publish prunes it.
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connection for WsChannel {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.tx.is_closed()
    }

    async fn send(&self, payload: &str) -> Result<(), DeliveryError> {
        let frame = serde_json::to_string(&ServerMessage::Data { data: payload })
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        match tokio::time::timeout(self.send_timeout, self.tx.send(frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => {
                self.close();
                Err(DeliveryError::Closed)
            }
            Err(_) => Err(DeliveryError::Transport(format!(
                "outbound queue full for {:?}",
                self.send_timeout
            ))),
        }
    }
}
