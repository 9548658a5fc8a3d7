//! Per-connection handler: subscribe, then pump broadcast frames to the socket.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use pubhub_config::ServerConfig;
use pubhub_core::PublishCoordinator;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::channel::WsChannel;
use crate::protocol::{ClientMessage, ServerMessage};

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsStream = SplitStream<WebSocketStream<TcpStream>>;

/// Handle a single WebSocket peer until it disconnects.
pub async fn handle_connection(
    ws: WebSocketStream<TcpStream>,
    addr: SocketAddr,
    hub: PublishCoordinator,
    settings: Arc<ServerConfig>,
) {
    let (mut sink, mut stream) = ws.split();

    // 1. The first frame names the subscriber.
    let Some(name) = read_hello(&mut stream, addr, &settings).await else {
        return;
    };

    // 2. Register the peer's outbound channel with the hub.
    let (channel, mut rx) = WsChannel::new(
        settings.outbound_capacity as usize,
        settings.send_timeout(),
    );
    if !subscribe(&hub, &channel, &name, &mut sink).await {
        return;
    }
    tracing::info!(peer = %addr, subscriber = %name, "Client subscribed");
    let mut subscribed = true;

    // 3. Forwarding loop.
    loop {
        tokio::select! {
            // Broadcast frames queued by the hub → this client's socket
            Some(frame) = rx.recv() => {
                if sink.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }

            // Control frames from the client
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::Subscribe { name }) => {
                                if !subscribe(&hub, &channel, &name, &mut sink).await {
                                    break;
                                }
                                subscribed = true;
                            }
                            Ok(ClientMessage::Unsubscribe) => {
                                hub.unsubscribe(&channel);
                                subscribed = false;
                                let _ = send_response(&mut sink, &ServerMessage::Unsubscribed).await;
                            }
                            Ok(ClientMessage::Ping) => {
                                let _ = send_response(&mut sink, &ServerMessage::Pong).await;
                            }
                            Err(e) => {
                                tracing::debug!(peer = %addr, error = %e, "Bad client message");
                                let _ = send_response(
                                    &mut sink,
                                    &ServerMessage::Error { message: e.to_string() },
                                )
                                .await;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(peer = %addr, error = %e, "WS error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    // 4. Cleanup. Close first so a concurrent publish prunes rather than sends.
    channel.close();
    if subscribed {
        hub.unsubscribe(&channel);
    }
    tracing::info!(peer = %addr, subscriber = %name, "Client disconnected");
}

/// Register `channel` and acknowledge. Returns false if the peer should be
/// dropped.
async fn subscribe(
    hub: &PublishCoordinator,
    channel: &Arc<WsChannel>,
    name: &str,
    sink: &mut WsSink,
) -> bool {
    match hub.subscribe(channel, name) {
        Ok(connection_id) => send_response(sink, &ServerMessage::Subscribed { connection_id })
            .await
            .is_ok(),
        Err(e) => {
            let _ = send_response(
                sink,
                &ServerMessage::Error {
                    message: e.to_string(),
                },
            )
            .await;
            false
        }
    }
}

/// Read the first frame and return the subscriber name it carries.
async fn read_hello(
    stream: &mut WsStream,
    addr: SocketAddr,
    settings: &ServerConfig,
) -> Option<String> {
    let frame = tokio::time::timeout(settings.hello_timeout(), stream.next()).await;

    match frame {
        Ok(Some(Ok(Message::Text(text)))) => match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::Subscribe { name }) => Some(name),
            Ok(other) => {
                tracing::warn!(peer = %addr, message = ?other, "Expected subscribe as first message");
                None
            }
            Err(e) => {
                tracing::warn!(peer = %addr, error = %e, "Invalid hello message");
                None
            }
        },
        Ok(Some(Ok(_))) => {
            tracing::warn!(peer = %addr, "Expected text hello, got binary");
            None
        }
        Ok(Some(Err(e))) => {
            tracing::warn!(peer = %addr, error = %e, "WS error during hello");
            None
        }
        Ok(None) => {
            tracing::debug!(peer = %addr, "Connection closed before hello");
            None
        }
        Err(_) => {
            tracing::warn!(
                peer = %addr,
                timeout_secs = settings.hello_timeout_secs,
                "Hello timeout"
            );
            None
        }
    }
}

/// Send a ServerMessage as a JSON text frame.
async fn send_response(
    sink: &mut WsSink,
    response: &ServerMessage<'_>,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let json = serde_json::to_string(response)
        .map_err(|e| tokio_tungstenite::tungstenite::Error::Io(std::io::Error::other(e)))?;
    sink.send(Message::Text(json.into())).await
}
