//! Real-time event synchronization engine.
//!
//! Keeps a local task list consistent with the board server under two
//! competing update channels: bulk fetches over REST and a continuous
//! push stream of incremental [`TaskEvent`]s. The moving parts:
//!
//! - [`connection::ConnectionManager`] — owns the WebSocket, heartbeat,
//!   and the bounded-backoff reconnect policy.
//! - [`subscription::SubscriptionRegistry`] — topic → handler map,
//!   consulted at dispatch time.
//! - [`gate::EditGate`] — defers event application while a local edit is
//!   in progress and replays deferred events in arrival order.
//! - [`reducer`] — pure application of one event to the task list.
//! - [`controller::SyncController`] — wires the above together and owns
//!   the task list.
//!
//! [`TaskEvent`]: boardsync_proto::event::TaskEvent

pub mod connection;
pub mod controller;
pub mod gate;
pub mod reducer;
pub mod subscription;

pub use connection::{
    ConnectionConfig, ConnectionEvent, ConnectionManager, ConnectionState, ReconnectConfig,
};
pub use controller::SyncController;
pub use gate::EditGate;
pub use reducer::{reduce, reduce_all};
pub use subscription::{EventHandler, SubscriptionRegistry};
