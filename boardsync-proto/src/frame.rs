//! Push-protocol negotiation frames.
//!
//! A STOMP-shaped text protocol carried over WebSocket text frames. The
//! client opens a session with `CONNECT`, the server confirms with
//! `CONNECTED`, subscriptions are managed per topic, and both sides
//! exchange `PING`/`PONG` heartbeats at the negotiated interval.
//! `MESSAGE` frames deliver topic payloads with the payload JSON kept as
//! opaque text in `body` — the hub routes by topic and never interprets
//! payload contents.

use serde::{Deserialize, Serialize};

use crate::codec::{self, CodecError};

/// Frames sent from a client to the push hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientFrame {
    /// Opens the push session. Must be the first frame on the socket;
    /// the server answers with [`ServerFrame::Connected`].
    #[serde(rename_all = "camelCase")]
    Connect {
        /// Opaque client identity, for server-side logging.
        client_id: String,
        /// Heartbeat interval the client intends to send at.
        heartbeat_ms: u64,
    },
    /// Subscribes this connection to a topic.
    Subscribe {
        /// Topic name.
        topic: String,
    },
    /// Cancels this connection's subscription to a topic.
    Unsubscribe {
        /// Topic name.
        topic: String,
    },
    /// Client-side heartbeat.
    Ping,
    /// Graceful goodbye before closing the socket.
    Disconnect,
}

/// Frames sent from the push hub to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerFrame {
    /// Confirms a [`ClientFrame::Connect`]; the session is live.
    #[serde(rename_all = "camelCase")]
    Connected {
        /// Heartbeat interval the server will send at.
        heartbeat_ms: u64,
    },
    /// A payload published on a subscribed topic.
    Message {
        /// Topic the payload was published on.
        topic: String,
        /// Payload JSON text, opaque to the framing layer.
        body: String,
    },
    /// Server-side heartbeat, answering a [`ClientFrame::Ping`].
    Pong,
    /// The server rejected a frame or the session.
    Error {
        /// Human-readable error description.
        message: String,
    },
}

/// Encodes a [`ClientFrame`] as JSON text.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if serialization fails.
pub fn encode_client(frame: &ClientFrame) -> Result<String, CodecError> {
    codec::encode(frame)
}

/// Decodes a [`ClientFrame`] from JSON text.
///
/// # Errors
///
/// Returns [`CodecError::Deserialization`] if the text is not a valid
/// client frame.
pub fn decode_client(text: &str) -> Result<ClientFrame, CodecError> {
    codec::decode(text)
}

/// Encodes a [`ServerFrame`] as JSON text.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if serialization fails.
pub fn encode_server(frame: &ServerFrame) -> Result<String, CodecError> {
    codec::encode(frame)
}

/// Decodes a [`ServerFrame`] from JSON text.
///
/// # Errors
///
/// Returns [`CodecError::Deserialization`] if the text is not a valid
/// server frame.
pub fn decode_server(text: &str) -> Result<ServerFrame, CodecError> {
    codec::decode(text)
}
