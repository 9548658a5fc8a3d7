//! Wire protocol between the server and its subscribers. JSON text frames.

use pubhub_common::ConnectionId;
use serde::{Deserialize, Serialize};

/// Frames a client may send. The first one must be `subscribe`.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "subscribe")]
    Subscribe { name: String },

    #[serde(rename = "unsubscribe")]
    Unsubscribe,

    #[serde(rename = "ping")]
    Ping,
}

/// Frames the server sends back.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage<'a> {
    #[serde(rename = "subscribed")]
    Subscribed { connection_id: ConnectionId },

    #[serde(rename = "unsubscribed")]
    Unsubscribed,

    #[serde(rename = "pong")]
    Pong,

    /// A broadcast payload.
    #[serde(rename = "data")]
    Data { data: &'a str },

    #[serde(rename = "error")]
    Error { message: String },
}
