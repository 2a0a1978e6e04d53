//! Pure reduction of push events onto the task list.
//!
//! `reduce` is total and idempotent per event kind: replaying a duplicate
//! delivery leaves the list unchanged, and no event may touch any entry
//! other than the one addressed by its id. The list keeps insertion
//! order; creations append, updates replace in place.

use boardsync_proto::event::TaskEvent;
use boardsync_proto::task::Task;

/// Applies one event to the task list, producing the new list.
///
/// - `Created`: appended unless the id is already present (duplicate
///   delivery is a no-op).
/// - `Updated`: replaces the entry with the matching id. An unknown id is
///   dropped rather than inserted, so a stale update can never resurrect
///   a deleted task.
/// - `Deleted`: removes the matching entry; an absent id is a no-op.
/// - `Unknown`: no-op.
#[must_use]
pub fn reduce(tasks: Vec<Task>, event: &TaskEvent) -> Vec<Task> {
    match event {
        TaskEvent::Created { task } => {
            if tasks.iter().any(|t| t.id == task.id) {
                tracing::debug!(id = %task.id, "duplicate CREATED ignored");
                tasks
            } else {
                let mut tasks = tasks;
                tasks.push(task.clone());
                tasks
            }
        }
        TaskEvent::Updated { task } => {
            if tasks.iter().any(|t| t.id == task.id) {
                tasks
                    .into_iter()
                    .map(|t| if t.id == task.id { task.clone() } else { t })
                    .collect()
            } else {
                tracing::debug!(id = %task.id, "UPDATED for unknown id dropped");
                tasks
            }
        }
        TaskEvent::Deleted { task_id } => {
            tasks.into_iter().filter(|t| t.id != *task_id).collect()
        }
        TaskEvent::Unknown => tasks,
    }
}

/// Folds a sequence of events over the task list in order.
///
/// Used to replay the edit gate's deferred queue; the result equals
/// applying each event immediately as it arrived.
#[must_use]
pub fn reduce_all<'a, I>(tasks: Vec<Task>, events: I) -> Vec<Task>
where
    I: IntoIterator<Item = &'a TaskEvent>,
{
    events.into_iter().fold(tasks, reduce)
}
