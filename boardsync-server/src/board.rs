//! In-memory board state: the authoritative task list.
//!
//! Holds the ordered task list behind an async `RwLock`, allocates ids,
//! validates titles, and enforces optimistic concurrency on update. Every
//! successful mutation returns the [`TaskEvent`] that must be broadcast
//! to push subscribers.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tokio::sync::RwLock;

use boardsync_proto::event::TaskEvent;
use boardsync_proto::task::{MAX_TITLE_LENGTH, NewTask, Task, TaskId, TaskUpdate};

/// Errors that can occur during board mutations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BoardError {
    /// Task title cannot be empty.
    #[error("task title cannot be empty")]
    TitleEmpty,

    /// Task title exceeds the maximum length.
    #[error("task title too long (max 255 characters)")]
    TitleTooLong,

    /// No task with the given id exists.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The update was based on a stale version of the task.
    #[error("version conflict on task {id}: update carried {given}, current is {current}")]
    VersionConflict {
        /// The task the update addressed.
        id: TaskId,
        /// Version the caller sent.
        given: u64,
        /// Version currently stored.
        current: u64,
    },
}

/// The authoritative task list.
///
/// Insertion order is preserved; ids are unique and never reused within a
/// server lifetime.
pub struct BoardState {
    tasks: RwLock<Vec<Task>>,
    next_id: AtomicU64,
}

impl Default for BoardState {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardState {
    /// Creates an empty board.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Returns a snapshot of all tasks in insertion order.
    pub async fn list(&self) -> Vec<Task> {
        self.tasks.read().await.clone()
    }

    /// Returns the task with the given id, if present.
    pub async fn get(&self, id: TaskId) -> Option<Task> {
        self.tasks.read().await.iter().find(|t| t.id == id).cloned()
    }

    /// Creates a task and returns it together with the event to broadcast.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::TitleEmpty`] or [`BoardError::TitleTooLong`]
    /// when the title fails validation.
    pub async fn create(&self, new: NewTask) -> Result<(Task, TaskEvent), BoardError> {
        validate_title(&new.title)?;

        let now = Utc::now();
        let task = Task {
            id: TaskId::new(self.next_id.fetch_add(1, Ordering::Relaxed)),
            title: new.title,
            description: new.description,
            status: new.status,
            priority: new.priority,
            version: 0,
            created_at: Some(now),
            updated_at: Some(now),
        };

        self.tasks.write().await.push(task.clone());
        tracing::debug!(id = %task.id, "task created");

        let event = TaskEvent::Created { task: task.clone() };
        Ok((task, event))
    }

    /// Applies a full update to a task.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::NotFound`] for an unknown id,
    /// [`BoardError::VersionConflict`] when the update carries a stale
    /// version, or a validation error for a bad title.
    pub async fn update(&self, id: TaskId, update: TaskUpdate) -> Result<(Task, TaskEvent), BoardError> {
        validate_title(&update.title)?;

        let mut tasks = self.tasks.write().await;
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(BoardError::NotFound(id))?;

        if task.version != update.version {
            return Err(BoardError::VersionConflict {
                id,
                given: update.version,
                current: task.version,
            });
        }

        task.title = update.title;
        task.description = update.description;
        task.status = update.status;
        task.priority = update.priority;
        task.version += 1;
        task.updated_at = Some(Utc::now());

        let updated = task.clone();
        tracing::debug!(id = %id, version = updated.version, "task updated");

        let event = TaskEvent::Updated {
            task: updated.clone(),
        };
        Ok((updated, event))
    }

    /// Removes a task.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::NotFound`] for an unknown id.
    pub async fn remove(&self, id: TaskId) -> Result<TaskEvent, BoardError> {
        let mut tasks = self.tasks.write().await;
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() == before {
            return Err(BoardError::NotFound(id));
        }
        tracing::debug!(id = %id, "task deleted");
        Ok(TaskEvent::Deleted { task_id: id })
    }
}

/// Validates a task title against the board's constraints.
fn validate_title(title: &str) -> Result<(), BoardError> {
    if title.is_empty() {
        return Err(BoardError::TitleEmpty);
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(BoardError::TitleTooLong);
    }
    Ok(())
}
