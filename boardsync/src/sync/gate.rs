//! Edit gate: defers push-event application during a local edit session.
//!
//! While the user is composing a change to a task, applying incoming
//! events would yank the list out from under the editor. The gate buffers
//! every event that arrives during an edit session and hands them back,
//! in arrival order, when the session ends.
//!
//! The gate is non-reentrant: it is a single boolean, a second
//! `begin_edit` while open has no additional effect, and one `end_edit`
//! closes it regardless of how many `begin_edit` calls preceded it.
//! Overlapping edit sessions are not a supported scenario.

use std::collections::VecDeque;

use boardsync_proto::event::TaskEvent;

/// Deferred-application gate with a FIFO pending queue.
///
/// Invariant: while the gate is idle the pending queue is empty — the
/// queue is drained in the same call that closes the gate.
#[derive(Debug, Default)]
pub struct EditGate {
    open: bool,
    pending: VecDeque<TaskEvent>,
}

impl EditGate {
    /// Creates an idle gate with an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the gate: subsequent events are buffered instead of applied.
    ///
    /// Calling this while the gate is already open is a no-op.
    pub fn begin_edit(&mut self) {
        if self.open {
            tracing::debug!("edit gate already open");
            return;
        }
        self.open = true;
        tracing::debug!("edit gate opened");
    }

    /// Closes the gate and returns the deferred events in arrival order.
    ///
    /// The queue is drained atomically with the transition; callers must
    /// replay the returned events against the task list before admitting
    /// any new event. Calling this while the gate is idle returns an
    /// empty vec.
    pub fn end_edit(&mut self) -> Vec<TaskEvent> {
        self.open = false;
        let drained: Vec<TaskEvent> = self.pending.drain(..).collect();
        if !drained.is_empty() {
            tracing::debug!(count = drained.len(), "edit gate closed, replaying deferred events");
        }
        drained
    }

    /// Routes one event through the gate.
    ///
    /// Returns `Some(event)` when the gate is idle (apply immediately) or
    /// `None` when the event was buffered for later replay.
    pub fn offer(&mut self, event: TaskEvent) -> Option<TaskEvent> {
        if self.open {
            self.pending.push_back(event);
            None
        } else {
            Some(event)
        }
    }

    /// Whether an edit session is currently in progress.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.open
    }

    /// Number of events currently deferred.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
