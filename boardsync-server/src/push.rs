//! Push hub: WebSocket session handling and topic fan-out.
//!
//! Each accepted socket goes through a `CONNECT`/`CONNECTED` handshake,
//! then subscribes to topics by name. Board mutations are broadcast as
//! `MESSAGE` frames to every subscriber of the tasks topic, in the order
//! the mutations were applied. The hub never interprets payload bodies.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{RwLock, mpsc};

use boardsync_proto::event::{self, TASK_TOPIC, TaskEvent};
use boardsync_proto::frame::{self, ClientFrame, ServerFrame};

/// Default heartbeat interval announced in the `CONNECTED` frame.
pub const DEFAULT_HEARTBEAT_MS: u64 = 4000;

/// Connection registry and topic fan-out state.
pub struct PushHub {
    /// Connection id -> channel to that connection's WebSocket writer.
    connections: RwLock<HashMap<u64, mpsc::UnboundedSender<Message>>>,
    /// Topic name -> ids of subscribed connections.
    topics: RwLock<HashMap<String, HashSet<u64>>>,
    /// Next connection id to allocate.
    next_conn_id: AtomicU64,
    /// Heartbeat interval announced to clients.
    heartbeat_ms: u64,
}

impl Default for PushHub {
    fn default() -> Self {
        Self::new()
    }
}

impl PushHub {
    /// Creates a hub with the default heartbeat interval.
    #[must_use]
    pub fn new() -> Self {
        Self::with_heartbeat(DEFAULT_HEARTBEAT_MS)
    }

    /// Creates a hub announcing a custom heartbeat interval.
    #[must_use]
    pub fn with_heartbeat(heartbeat_ms: u64) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            topics: RwLock::new(HashMap::new()),
            next_conn_id: AtomicU64::new(1),
            heartbeat_ms,
        }
    }

    /// The heartbeat interval announced in `CONNECTED` frames.
    #[must_use]
    pub const fn heartbeat_ms(&self) -> u64 {
        self.heartbeat_ms
    }

    /// Registers a connection's writer channel and allocates its id.
    pub async fn register(&self, sender: mpsc::UnboundedSender<Message>) -> u64 {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        self.connections.write().await.insert(conn_id, sender);
        conn_id
    }

    /// Removes a connection and all of its topic subscriptions.
    pub async fn unregister(&self, conn_id: u64) {
        self.connections.write().await.remove(&conn_id);
        let mut topics = self.topics.write().await;
        for subscribers in topics.values_mut() {
            subscribers.remove(&conn_id);
        }
        topics.retain(|_, subscribers| !subscribers.is_empty());
    }

    /// Subscribes a connection to a topic. Subscribing twice is a no-op.
    pub async fn subscribe(&self, conn_id: u64, topic: &str) {
        let mut topics = self.topics.write().await;
        let inserted = topics.entry(topic.to_string()).or_default().insert(conn_id);
        tracing::debug!(conn_id, topic, fresh = inserted, "subscribe");
    }

    /// Cancels a connection's subscription to a topic. No-op when absent.
    pub async fn unsubscribe(&self, conn_id: u64, topic: &str) {
        let mut topics = self.topics.write().await;
        if let Some(subscribers) = topics.get_mut(topic) {
            subscribers.remove(&conn_id);
            if subscribers.is_empty() {
                topics.remove(topic);
            }
        }
        tracing::debug!(conn_id, topic, "unsubscribe");
    }

    /// Number of live subscriptions to a topic.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .await
            .get(topic)
            .map_or(0, HashSet::len)
    }

    /// Broadcasts a task event to every subscriber of the tasks topic.
    pub async fn broadcast_event(&self, event: &TaskEvent) {
        match event::encode(event) {
            Ok(body) => self.broadcast(TASK_TOPIC, body).await,
            Err(e) => tracing::error!(error = %e, "failed to encode task event"),
        }
    }

    /// Broadcasts a payload body on a topic as a `MESSAGE` frame.
    pub async fn broadcast(&self, topic: &str, body: String) {
        let server_frame = ServerFrame::Message {
            topic: topic.to_string(),
            body,
        };
        let Ok(text) = frame::encode_server(&server_frame) else {
            tracing::error!(topic, "failed to encode MESSAGE frame");
            return;
        };

        let subscribers: Vec<u64> = {
            let topics = self.topics.read().await;
            topics
                .get(topic)
                .map(|s| s.iter().copied().collect())
                .unwrap_or_default()
        };

        let connections = self.connections.read().await;
        for conn_id in subscribers {
            if let Some(sender) = connections.get(&conn_id) {
                // A closed channel means the connection is being torn
                // down; cleanup happens in its handler task.
                let _ = sender.send(Message::Text(text.clone().into()));
            }
        }
        tracing::debug!(topic, "broadcast");
    }

    /// Sends a WebSocket close frame to every connection.
    ///
    /// Clients observe this as an abnormal closure, which makes it a
    /// convenient disconnect-simulation hook for tests.
    pub async fn close_all(&self) {
        let connections = self.connections.read().await;
        for (conn_id, sender) in connections.iter() {
            tracing::info!(conn_id, "sending close frame");
            let _ = sender.send(Message::Close(None));
        }
    }
}

/// Handles an upgraded WebSocket connection.
///
/// Lifecycle:
/// 1. Wait for a `CONNECT` frame; anything else gets an `ERROR` frame and
///    the socket is dropped.
/// 2. Answer `CONNECTED` and register the connection.
/// 3. Serve `SUBSCRIBE`/`UNSUBSCRIBE`/`PING` until the peer disconnects.
/// 4. Unregister on the way out.
pub async fn handle_socket(socket: WebSocket, hub: Arc<PushHub>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    if !wait_for_connect(&mut ws_receiver).await {
        let reject = ServerFrame::Error {
            message: "expected CONNECT".to_string(),
        };
        if let Ok(text) = frame::encode_server(&reject) {
            let _ = ws_sender.send(Message::Text(text.into())).await;
        }
        tracing::warn!("connection closed before handshake");
        return;
    }

    let connected = ServerFrame::Connected {
        heartbeat_ms: hub.heartbeat_ms(),
    };
    let Ok(text) = frame::encode_server(&connected) else {
        return;
    };
    if ws_sender.send(Message::Text(text.into())).await.is_err() {
        tracing::warn!("failed to send CONNECTED frame");
        return;
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let conn_id = hub.register(tx.clone()).await;
    tracing::info!(conn_id, "push session established");

    // Writer task: forward channel messages to the WebSocket.
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let is_close = matches!(msg, Message::Close(_));
            if ws_sender.send(msg).await.is_err() || is_close {
                break;
            }
        }
    });

    // Reader task: serve client frames until disconnect.
    let reader_hub = Arc::clone(&hub);
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if !handle_client_frame(conn_id, text.as_str(), &reader_hub, &tx).await {
                        break;
                    }
                }
                Message::Close(_) => {
                    tracing::info!(conn_id, "received close frame");
                    break;
                }
                _ => {
                    // Ignore binary, ping, pong frames.
                }
            }
        }
    });

    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    hub.unregister(conn_id).await;
    tracing::info!(conn_id, "push session closed");
}

/// Waits for the handshake `CONNECT` frame.
///
/// Returns `true` on a valid handshake, `false` if the connection closes
/// first or the first frame is not a `CONNECT`.
async fn wait_for_connect(
    receiver: &mut (impl StreamExt<Item = Result<Message, axum::Error>> + Unpin),
) -> bool {
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match frame::decode_client(text.as_str()) {
                Ok(ClientFrame::Connect {
                    client_id,
                    heartbeat_ms,
                }) => {
                    tracing::info!(client_id = %client_id, heartbeat_ms, "client connected");
                    return true;
                }
                Ok(other) => {
                    tracing::warn!(frame = ?other, "expected CONNECT, got different frame");
                    return false;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to decode handshake frame");
                    return false;
                }
            },
            Message::Close(_) => return false,
            _ => {
                // Skip non-text frames during the handshake.
            }
        }
    }
    false
}

/// Handles one decoded client frame. Returns `false` when the session
/// should end.
async fn handle_client_frame(
    conn_id: u64,
    text: &str,
    hub: &Arc<PushHub>,
    tx: &mpsc::UnboundedSender<Message>,
) -> bool {
    let parsed = match frame::decode_client(text) {
        Ok(f) => f,
        Err(e) => {
            // Malformed frame: log and skip, keep the session alive.
            tracing::warn!(conn_id, error = %e, "malformed client frame, skipping");
            return true;
        }
    };

    match parsed {
        ClientFrame::Subscribe { topic } => {
            hub.subscribe(conn_id, &topic).await;
        }
        ClientFrame::Unsubscribe { topic } => {
            hub.unsubscribe(conn_id, &topic).await;
        }
        ClientFrame::Ping => {
            if let Ok(pong) = frame::encode_server(&ServerFrame::Pong) {
                let _ = tx.send(Message::Text(pong.into()));
            }
        }
        ClientFrame::Connect { .. } => {
            tracing::warn!(conn_id, "duplicate CONNECT ignored");
        }
        ClientFrame::Disconnect => {
            tracing::info!(conn_id, "client said goodbye");
            return false;
        }
    }
    true
}
