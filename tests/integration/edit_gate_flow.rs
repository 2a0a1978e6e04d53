// Test-specific lint overrides: integration tests use unwrap/expect freely,
// and some pedantic/nursery lints are not appropriate for test code.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::future_not_send,
    clippy::redundant_pub_crate,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::missing_docs_in_private_items
)]

//! Edit-gate behavior over a live push channel.
//!
//! While an edit session is open, events received from the server must be
//! deferred — not applied, not dropped — and replayed in arrival order
//! the moment the session ends. These tests drive the full pipeline:
//! another REST client mutates the board, the server broadcasts, and the
//! watching controller gates the resulting events.

use std::sync::Arc;
use std::time::Duration;

use boardsync::store::{HttpTaskStore, TaskStore};
use boardsync::sync::{ConnectionConfig, ConnectionState, ReconnectConfig, SyncController};
use boardsync_proto::task::{NewTask, Priority, Task, TaskStatus, TaskUpdate};
use boardsync_server::http::AppState;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn start_board() -> (Arc<AppState>, String, tokio::task::JoinHandle<()>) {
    let state = Arc::new(AppState::new());
    let (addr, handle) =
        boardsync_server::http::start_server_with_state("127.0.0.1:0", Arc::clone(&state))
            .await
            .expect("failed to start board server");
    (state, format!("http://{addr}"), handle)
}

fn fast_connection(base_url: &str) -> ConnectionConfig {
    let ws_url = format!("ws://{}/ws", base_url.trim_start_matches("http://"));
    let mut config = ConnectionConfig::new(ws_url);
    config.heartbeat = Duration::from_millis(200);
    config.connect_timeout = Duration::from_secs(2);
    config.reconnect = ReconnectConfig {
        base_delay: Duration::from_millis(100),
        max_attempts: 5,
    };
    config
}

async fn start_watcher(base_url: &str) -> SyncController<HttpTaskStore> {
    let store = HttpTaskStore::new(base_url).expect("valid base url");
    let mut controller = SyncController::new(store, fast_connection(base_url));
    controller.start().await.expect("controller start failed");

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while controller.connection_state() != ConnectionState::Connected {
        assert!(
            tokio::time::Instant::now() < deadline,
            "controller never connected"
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    controller
}

fn make_new(title: &str) -> NewTask {
    NewTask {
        title: title.to_string(),
        description: None,
        status: TaskStatus::ToDo,
        priority: Priority::Medium,
    }
}

async fn wait_for_tasks<F>(
    controller: &SyncController<HttpTaskStore>,
    timeout: Duration,
    description: &str,
    pred: F,
) -> Vec<Task>
where
    F: Fn(&[Task]) -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        let tasks = controller.tasks();
        if pred(&tasks) {
            return tasks;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("timeout waiting for {description}; tasks: {:?}", controller.tasks());
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// The reference scenario: list starts as `[{1, TO_DO}]`, the gate opens,
/// `CREATED{2}` and `UPDATED{1 → DONE}` arrive, the gate closes. The
/// result must be `[{1, DONE}, {2, TO_DO}]` with task 1 keeping its
/// position.
#[tokio::test]
async fn deferred_events_replay_in_order_on_end_edit() {
    let (_state, base_url, _handle) = start_board().await;
    let controller = start_watcher(&base_url).await;

    let other = HttpTaskStore::new(&base_url).unwrap();
    let first = other.create(make_new("one")).await.unwrap();
    wait_for_tasks(&controller, Duration::from_secs(5), "seed task", |tasks| {
        tasks.len() == 1
    })
    .await;

    // User opens the editor.
    controller.begin_edit();

    // Meanwhile, the board changes under them.
    let second = other.create(make_new("two")).await.unwrap();
    other
        .update(
            first.id,
            TaskUpdate {
                title: "one".to_string(),
                description: None,
                status: TaskStatus::Done,
                priority: first.priority,
                version: first.version,
            },
        )
        .await
        .unwrap();

    // Give the events ample time to arrive; the gate must hold them.
    tokio::time::sleep(Duration::from_millis(500)).await;
    let during_edit = controller.tasks();
    assert_eq!(during_edit.len(), 1, "events leaked through an open gate");
    assert_eq!(during_edit[0].status, TaskStatus::ToDo);

    // Editor closes; the deferred events replay in arrival order.
    controller.end_edit();

    let tasks = wait_for_tasks(&controller, Duration::from_secs(5), "replayed state", |tasks| {
        tasks.len() == 2
    })
    .await;
    assert_eq!(tasks[0].id, first.id, "task 1 must keep its position");
    assert_eq!(tasks[0].status, TaskStatus::Done);
    assert_eq!(tasks[1].id, second.id);
    assert_eq!(tasks[1].status, TaskStatus::ToDo);
}

/// Deletions deferred during an edit must also land exactly once.
#[tokio::test]
async fn deferred_delete_applies_once_on_replay() {
    let (_state, base_url, _handle) = start_board().await;
    let controller = start_watcher(&base_url).await;

    let other = HttpTaskStore::new(&base_url).unwrap();
    let doomed = other.create(make_new("doomed")).await.unwrap();
    let keeper = other.create(make_new("keeper")).await.unwrap();
    wait_for_tasks(&controller, Duration::from_secs(5), "both tasks", |tasks| {
        tasks.len() == 2
    })
    .await;

    controller.begin_edit();
    other.delete(doomed.id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(controller.tasks().len(), 2);

    controller.end_edit();
    let tasks = wait_for_tasks(&controller, Duration::from_secs(5), "after replay", |tasks| {
        tasks.len() == 1
    })
    .await;
    assert_eq!(tasks[0].id, keeper.id);

    // A second end_edit is a no-op: the queue was drained atomically.
    controller.end_edit();
    assert_eq!(controller.tasks().len(), 1);
}

/// The gate can be reused across consecutive edit sessions.
#[tokio::test]
async fn gate_reopens_cleanly_for_a_second_session() {
    let (_state, base_url, _handle) = start_board().await;
    let controller = start_watcher(&base_url).await;

    let other = HttpTaskStore::new(&base_url).unwrap();

    // First session.
    controller.begin_edit();
    let a = other.create(make_new("a")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(controller.tasks().is_empty());
    controller.end_edit();
    wait_for_tasks(&controller, Duration::from_secs(5), "task a", |tasks| {
        tasks.iter().any(|t| t.id == a.id)
    })
    .await;

    // Second session.
    controller.begin_edit();
    let b = other.create(make_new("b")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(controller.tasks().len(), 1, "second session must gate too");
    controller.end_edit();
    let tasks = wait_for_tasks(&controller, Duration::from_secs(5), "task b", |tasks| {
        tasks.iter().any(|t| t.id == b.id)
    })
    .await;
    assert_eq!(tasks.len(), 2);
}

/// Events arriving after `end_edit` apply immediately again.
#[tokio::test]
async fn events_flow_immediately_after_session_ends() {
    let (_state, base_url, _handle) = start_board().await;
    let controller = start_watcher(&base_url).await;

    controller.begin_edit();
    controller.end_edit();

    let other = HttpTaskStore::new(&base_url).unwrap();
    let created = other.create(make_new("straight through")).await.unwrap();
    wait_for_tasks(&controller, Duration::from_secs(5), "immediate task", |tasks| {
        tasks.iter().any(|t| t.id == created.id)
    })
    .await;
}
