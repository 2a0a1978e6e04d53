//! Task store collaborators: the request-response channel.
//!
//! The sync engine treats the store as an external collaborator: a bulk
//! fetch seeds and refreshes the local list, and single-item CRUD calls
//! go straight to the source of truth. Store failures travel on their
//! own error channel and never disturb the push pipeline.

pub mod http;
pub mod memory;

pub use http::HttpTaskStore;
pub use memory::InMemoryTaskStore;

use boardsync_proto::task::{NewTask, Task, TaskId, TaskUpdate};

/// Errors that can occur talking to a task store.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    /// No task with the given id exists.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The update was based on a stale version of the task.
    #[error("version conflict on task {0}")]
    VersionConflict(TaskId),

    /// The request could not be carried out (network, DNS, refused).
    #[error("store request failed: {0}")]
    Request(String),

    /// The server answered with an unexpected status code.
    #[error("unexpected store status {0}")]
    Status(u16),

    /// The response body could not be decoded.
    #[error("invalid store response: {0}")]
    Decode(String),
}

/// Request-response access to the task source of truth.
///
/// All methods are async and side-effect-free on the local sync state;
/// the controller decides when to fold results back into the task list.
pub trait TaskStore: Send + Sync {
    /// Fetches the complete task list.
    fn fetch_all(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Task>, StoreError>> + Send;

    /// Creates a task, returning the stored record with its assigned id.
    fn create(
        &self,
        new: NewTask,
    ) -> impl std::future::Future<Output = Result<Task, StoreError>> + Send;

    /// Applies a full update to a task.
    fn update(
        &self,
        id: TaskId,
        update: TaskUpdate,
    ) -> impl std::future::Future<Output = Result<Task, StoreError>> + Send;

    /// Deletes a task.
    fn delete(
        &self,
        id: TaskId,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}
