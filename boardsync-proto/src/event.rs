//! Push event payloads for the tasks topic.
//!
//! A [`TaskEvent`] is an incremental change notification broadcast by the
//! server to every subscriber of [`TASK_TOPIC`]. Events carry no sequence
//! numbers: arrival order on the subscribed channel is the authoritative
//! order and must be preserved all the way into the local task list.

use serde::{Deserialize, Serialize};

use crate::codec::{self, CodecError};
use crate::task::{Task, TaskId};

/// The single logical channel carrying task change notifications.
pub const TASK_TOPIC: &str = "tasks";

/// An incremental task change notification.
///
/// The JSON shape is `{"type": "CREATED"|"UPDATED"|"DELETED", ...}` with
/// `task` present for creations and updates and `taskId` for deletions.
/// Any other `type` value decodes as [`TaskEvent::Unknown`] so that a
/// newer server cannot break an older client; unknown events reduce to a
/// no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TaskEvent {
    /// A task was created.
    #[serde(rename = "CREATED")]
    Created {
        /// The freshly created task.
        task: Task,
    },
    /// A task was updated.
    #[serde(rename = "UPDATED")]
    Updated {
        /// The full post-update task record.
        task: Task,
    },
    /// A task was deleted.
    #[serde(rename = "DELETED")]
    Deleted {
        /// Identifier of the removed task.
        #[serde(rename = "taskId")]
        task_id: TaskId,
    },
    /// An event type this client does not understand.
    #[serde(other)]
    Unknown,
}

impl TaskEvent {
    /// Returns the id of the task this event addresses, if any.
    #[must_use]
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            Self::Created { task } | Self::Updated { task } => Some(task.id),
            Self::Deleted { task_id } => Some(*task_id),
            Self::Unknown => None,
        }
    }
}

/// Encodes a [`TaskEvent`] as JSON text.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if serialization fails.
pub fn encode(event: &TaskEvent) -> Result<String, CodecError> {
    codec::encode(event)
}

/// Decodes a [`TaskEvent`] from JSON text.
///
/// # Errors
///
/// Returns [`CodecError::Deserialization`] if the text is not a valid
/// event payload. An unrecognized `type` value is NOT an error — it
/// decodes as [`TaskEvent::Unknown`].
pub fn decode(text: &str) -> Result<TaskEvent, CodecError> {
    codec::decode(text)
}
