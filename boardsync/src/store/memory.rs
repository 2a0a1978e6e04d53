//! In-process task store for tests and offline use.
//!
//! Mirrors the server's semantics — id allocation, version bumping, and
//! optimistic-concurrency conflicts — without any I/O, the same way an
//! in-process loopback stands in for a real transport.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use boardsync_proto::task::{NewTask, Task, TaskId, TaskUpdate};

use super::{StoreError, TaskStore};

/// Task store backed by a plain in-memory list.
#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: Mutex<Vec<Task>>,
    next_id: AtomicU64,
}

impl InMemoryTaskStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Creates a store pre-seeded with tasks. The id allocator starts
    /// above the highest seeded id.
    #[must_use]
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let highest = tasks.iter().map(|t| t.id.as_u64()).max().unwrap_or(0);
        Self {
            tasks: Mutex::new(tasks),
            next_id: AtomicU64::new(highest + 1),
        }
    }

    /// Snapshot of the stored tasks, in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Task> {
        self.tasks.lock().clone()
    }
}

impl TaskStore for InMemoryTaskStore {
    async fn fetch_all(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self.tasks.lock().clone())
    }

    async fn create(&self, new: NewTask) -> Result<Task, StoreError> {
        let task = Task {
            id: TaskId::new(self.next_id.fetch_add(1, Ordering::Relaxed)),
            title: new.title,
            description: new.description,
            status: new.status,
            priority: new.priority,
            version: 0,
            created_at: None,
            updated_at: None,
        };
        self.tasks.lock().push(task.clone());
        Ok(task)
    }

    async fn update(&self, id: TaskId, update: TaskUpdate) -> Result<Task, StoreError> {
        let mut tasks = self.tasks.lock();
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(StoreError::NotFound(id))?;

        if task.version != update.version {
            return Err(StoreError::VersionConflict(id));
        }

        task.title = update.title;
        task.description = update.description;
        task.status = update.status;
        task.priority = update.priority;
        task.version += 1;
        Ok(task.clone())
    }

    async fn delete(&self, id: TaskId) -> Result<(), StoreError> {
        let mut tasks = self.tasks.lock();
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() == before {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}
