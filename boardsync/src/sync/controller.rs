//! Sync controller: wires the connection, registry, gate, and reducer
//! around the task list.
//!
//! The controller owns the only copy of the task list. A bulk fetch from
//! the store seeds it, push events patch it through the edit gate and
//! the reducer, and every CRUD mutation triggers a fresh bulk fetch so
//! the list converges even when the push channel is briefly down. Gate
//! transitions and event application serialize on a single lock, which
//! makes the end-of-edit replay atomic: no event is applied twice,
//! dropped, or reordered.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;

use boardsync_proto::event::{TASK_TOPIC, TaskEvent};
use boardsync_proto::task::{NewTask, Task, TaskId, TaskUpdate};

use crate::store::{StoreError, TaskStore};

use super::connection::{ConnectionConfig, ConnectionEvent, ConnectionManager, ConnectionState};
use super::gate::EditGate;
use super::reducer;
use super::subscription::EventHandler;

/// The task list plus its edit gate, behind one lock.
#[derive(Debug, Default)]
struct SharedState {
    tasks: Vec<Task>,
    gate: EditGate,
}

impl SharedState {
    /// Routes one inbound event: reduced immediately while idle, queued
    /// while an edit is open.
    fn apply(&mut self, event: TaskEvent) {
        if let Some(event) = self.gate.offer(event) {
            let tasks = std::mem::take(&mut self.tasks);
            self.tasks = reducer::reduce(tasks, &event);
        }
    }

    /// Closes the gate and replays the deferred queue in arrival order.
    fn finish_edit(&mut self) {
        let deferred = self.gate.end_edit();
        if deferred.is_empty() {
            return;
        }
        let tasks = std::mem::take(&mut self.tasks);
        self.tasks = reducer::reduce_all(tasks, &deferred);
    }
}

/// Owns the task list and drives the sync pipeline.
///
/// One controller per UI session; the connection manager, registry, and
/// task list all have exactly this one owner.
pub struct SyncController<S> {
    store: S,
    connection: ConnectionManager,
    state: Arc<Mutex<SharedState>>,
    /// Set by [`stop`](Self::stop); the event loop skips re-subscribing
    /// once the session has ended its interest.
    stopped: Arc<AtomicBool>,
}

impl<S: TaskStore> SyncController<S> {
    /// Creates a controller over the given store and push configuration.
    /// Nothing runs until [`start`](Self::start).
    #[must_use]
    pub fn new(store: S, connection_config: ConnectionConfig) -> Self {
        Self {
            store,
            connection: ConnectionManager::new(connection_config),
            state: Arc::new(Mutex::new(SharedState::default())),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Bootstraps the controller: seeds the task list with one bulk
    /// fetch, then arms the push pipeline.
    ///
    /// The spawned event loop re-subscribes the tasks topic on every
    /// `Connected` event, which makes a backoff-path reconnect
    /// transparent to the rest of the session.
    ///
    /// # Errors
    ///
    /// Returns the store error if the seeding bulk fetch fails. The push
    /// pipeline is not armed in that case; callers may retry.
    pub async fn start(&mut self) -> Result<(), StoreError> {
        let tasks = self.store.fetch_all().await?;
        self.state.lock().tasks = tasks;

        let Some(mut events) = self.connection.take_events() else {
            tracing::debug!("controller already started");
            return Ok(());
        };

        let registry = Arc::clone(self.connection.registry());
        let shared = Arc::clone(&self.state);
        let stopped = Arc::clone(&self.stopped);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    ConnectionEvent::Connected => {
                        if stopped.load(Ordering::SeqCst) {
                            continue;
                        }
                        let handler_state = Arc::clone(&shared);
                        let handler: EventHandler = Arc::new(move |task_event| {
                            handler_state.lock().apply(task_event);
                        });
                        registry.subscribe(TASK_TOPIC, handler);
                    }
                    ConnectionEvent::Closed => {
                        tracing::debug!("push channel closed, awaiting reconnect");
                    }
                    ConnectionEvent::ProtocolError(message) => {
                        tracing::warn!(error = %message, "push protocol error");
                    }
                }
            }
        });

        self.connection.connect();
        Ok(())
    }

    /// Snapshot of the current task list.
    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        self.state.lock().tasks.clone()
    }

    /// Opens the edit gate: push events are deferred until
    /// [`end_edit`](Self::end_edit).
    pub fn begin_edit(&self) {
        self.state.lock().gate.begin_edit();
    }

    /// Closes the edit gate and replays deferred events in arrival order.
    pub fn end_edit(&self) {
        self.state.lock().finish_edit();
    }

    /// Whether an edit session is currently open.
    #[must_use]
    pub fn is_editing(&self) -> bool {
        self.state.lock().gate.is_open()
    }

    /// Creates a task through the store, then refreshes the list.
    ///
    /// The refresh covers the window where the push channel is down and
    /// the mutation's own event would otherwise be lost.
    ///
    /// # Errors
    ///
    /// Returns the store error from the create call.
    pub async fn create_task(&self, new: NewTask) -> Result<Task, StoreError> {
        let task = self.store.create(new).await?;
        self.refresh().await;
        Ok(task)
    }

    /// Updates a task through the store, then refreshes the list.
    ///
    /// # Errors
    ///
    /// Returns the store error from the update call, including
    /// [`StoreError::VersionConflict`] for stale versions.
    pub async fn update_task(&self, id: TaskId, update: TaskUpdate) -> Result<Task, StoreError> {
        let task = self.store.update(id, update).await?;
        self.refresh().await;
        Ok(task)
    }

    /// Deletes a task through the store, then refreshes the list.
    ///
    /// # Errors
    ///
    /// Returns the store error from the delete call.
    pub async fn delete_task(&self, id: TaskId) -> Result<(), StoreError> {
        self.store.delete(id).await?;
        self.refresh().await;
        Ok(())
    }

    /// Replaces the task list wholesale with a fresh bulk fetch.
    ///
    /// A failed fetch keeps the current list; the push channel will
    /// converge it eventually.
    pub async fn refresh(&self) {
        match self.store.fetch_all().await {
            Ok(tasks) => {
                self.state.lock().tasks = tasks;
            }
            Err(e) => {
                tracing::warn!(error = %e, "bulk fetch failed, keeping current list");
            }
        }
    }

    /// Current push connection state, for passive display.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Subscribes to push connection state changes.
    #[must_use]
    pub fn watch_connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection.watch_state()
    }

    /// Ends this session's interest in push updates.
    ///
    /// Unsubscribes the tasks topic only (and stops re-subscribing on
    /// later reconnects). The connection itself is a process-wide
    /// resource that later sessions may reuse, so this never calls
    /// [`ConnectionManager::disconnect`] — that is the owner's explicit
    /// decision at process teardown.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.connection.registry().unsubscribe(TASK_TOPIC);
    }

    /// The underlying connection manager.
    #[must_use]
    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }
}
