//! Subscription registry: topic → handler mapping for inbound events.
//!
//! The registry is consulted by the connection task at dispatch time, so
//! the handler that runs is always the one currently registered — never a
//! snapshot captured when the subscription was made. At most one handler
//! is live per topic; re-subscribing replaces it idempotently.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};

use boardsync_proto::event::{self, TaskEvent};

use super::connection::{Command, ConnectionState};

/// Handler invoked for each event parsed off a subscribed topic.
///
/// Handlers run synchronously on the connection task, one message at a
/// time, in arrival order. They must not block.
pub type EventHandler = Arc<dyn Fn(TaskEvent) + Send + Sync>;

/// Maps topic names to their live handlers and mirrors subscriptions to
/// the server.
pub struct SubscriptionRegistry {
    handlers: Mutex<HashMap<String, EventHandler>>,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
}

impl SubscriptionRegistry {
    /// Creates a registry wired to the connection's command channel and
    /// state watch. Built by the connection manager.
    pub(crate) fn new(
        commands: mpsc::UnboundedSender<Command>,
        state: watch::Receiver<ConnectionState>,
    ) -> Self {
        Self {
            handlers: Mutex::new(HashMap::new()),
            commands,
            state,
        }
    }

    /// Registers a handler for a topic and subscribes on the server.
    ///
    /// Fails silently (logs, returns `false`) unless the connection is
    /// currently `Connected` — callers re-subscribe from the connected
    /// callback after every (re)connect. A second call for an
    /// already-subscribed topic replaces the handler idempotently; the
    /// SUBSCRIBE frame is sent either way, since after a reconnect the
    /// fresh socket has no server-side subscriptions yet and the hub
    /// treats a duplicate subscribe as a no-op.
    pub fn subscribe(&self, topic: &str, handler: EventHandler) -> bool {
        if *self.state.borrow() != ConnectionState::Connected {
            tracing::warn!(topic, "not connected, cannot subscribe");
            return false;
        }

        let replaced = self
            .handlers
            .lock()
            .insert(topic.to_string(), handler)
            .is_some();
        let _ = self.commands.send(Command::Subscribe(topic.to_string()));
        if replaced {
            tracing::debug!(topic, "subscription handler replaced");
        } else {
            tracing::debug!(topic, "subscribed");
        }
        true
    }

    /// Cancels a topic's subscription. No-op when the topic has none.
    pub fn unsubscribe(&self, topic: &str) -> bool {
        let removed = self.handlers.lock().remove(topic).is_some();
        if removed {
            let _ = self.commands.send(Command::Unsubscribe(topic.to_string()));
            tracing::debug!(topic, "unsubscribed");
        }
        removed
    }

    /// Parses a raw message body and invokes the topic's current handler.
    ///
    /// A parse failure is logged and the message dropped; it never
    /// unwinds into the read loop or blocks subsequent messages. A
    /// message for a topic with no handler is dropped quietly.
    pub fn dispatch(&self, topic: &str, body: &str) {
        let handler = self.handlers.lock().get(topic).cloned();
        let Some(handler) = handler else {
            tracing::debug!(topic, "message for unsubscribed topic dropped");
            return;
        };

        match event::decode(body) {
            Ok(event) => handler(event),
            Err(e) => {
                tracing::warn!(topic, error = %e, "malformed event payload dropped");
            }
        }
    }

    /// Topics with a live subscription.
    #[must_use]
    pub fn topics(&self) -> Vec<String> {
        self.handlers.lock().keys().cloned().collect()
    }

    /// Whether a topic currently has a handler.
    #[must_use]
    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.handlers.lock().contains_key(topic)
    }

    /// Drops every registered handler without notifying the server.
    ///
    /// Used on full disconnect, where the session sends the UNSUBSCRIBE
    /// frames itself before closing the socket.
    pub fn clear(&self) {
        self.handlers.lock().clear();
    }
}
