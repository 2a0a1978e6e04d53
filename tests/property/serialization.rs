//! Property-based serialization round-trip tests for the wire protocol.
//!
//! Uses proptest to verify:
//! 1. Any valid `Task` survives a JSON encode → decode round-trip.
//! 2. Any valid `TaskEvent` survives encode → decode.
//! 3. Client and server frames survive encode → decode.
//! 4. Arbitrary text never panics the decoders (graceful `Err` or, for
//!    an unknown event `type`, the `Unknown` no-op variant).

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{DateTime, Utc};
use proptest::prelude::*;

use boardsync_proto::event::{self, TaskEvent};
use boardsync_proto::frame::{self, ClientFrame, ServerFrame};
use boardsync_proto::task::{Priority, Task, TaskId, TaskStatus};

// --- Strategies for protocol types ---

/// Strategy for arbitrary task statuses.
fn arb_status() -> impl Strategy<Value = TaskStatus> {
    prop_oneof![
        Just(TaskStatus::ToDo),
        Just(TaskStatus::InProgress),
        Just(TaskStatus::Done),
    ]
}

/// Strategy for arbitrary priorities.
fn arb_priority() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just(Priority::Low),
        Just(Priority::Medium),
        Just(Priority::High),
    ]
}

/// Strategy for optional timestamps, millisecond-aligned (the server's
/// clock resolution on the wire).
fn arb_timestamp() -> impl Strategy<Value = Option<DateTime<Utc>>> {
    prop_oneof![
        Just(None),
        (0i64..4_102_444_800_000i64).prop_map(DateTime::from_timestamp_millis),
    ]
}

/// Strategy for arbitrary tasks. Titles avoid NUL but are otherwise
/// unconstrained unicode.
fn arb_task() -> impl Strategy<Value = Task> {
    (
        any::<u64>(),
        "[^\x00]{1,64}",
        prop::option::of("[^\x00]{0,256}"),
        arb_status(),
        arb_priority(),
        any::<u64>(),
        arb_timestamp(),
        arb_timestamp(),
    )
        .prop_map(
            |(id, title, description, status, priority, version, created_at, updated_at)| Task {
                id: TaskId::new(id),
                title,
                description,
                status,
                priority,
                version,
                created_at,
                updated_at,
            },
        )
}

/// Strategy for arbitrary task events (the three concrete kinds).
fn arb_event() -> impl Strategy<Value = TaskEvent> {
    prop_oneof![
        arb_task().prop_map(|task| TaskEvent::Created { task }),
        arb_task().prop_map(|task| TaskEvent::Updated { task }),
        any::<u64>().prop_map(|id| TaskEvent::Deleted {
            task_id: TaskId::new(id)
        }),
    ]
}

/// Strategy for arbitrary client frames.
fn arb_client_frame() -> impl Strategy<Value = ClientFrame> {
    prop_oneof![
        ("[a-z0-9-]{1,32}", any::<u64>()).prop_map(|(client_id, heartbeat_ms)| {
            ClientFrame::Connect {
                client_id,
                heartbeat_ms,
            }
        }),
        "[a-z]{1,16}".prop_map(|topic| ClientFrame::Subscribe { topic }),
        "[a-z]{1,16}".prop_map(|topic| ClientFrame::Unsubscribe { topic }),
        Just(ClientFrame::Ping),
        Just(ClientFrame::Disconnect),
    ]
}

/// Strategy for arbitrary server frames.
fn arb_server_frame() -> impl Strategy<Value = ServerFrame> {
    prop_oneof![
        any::<u64>().prop_map(|heartbeat_ms| ServerFrame::Connected { heartbeat_ms }),
        ("[a-z]{1,16}", "[^\x00]{0,512}").prop_map(|(topic, body)| ServerFrame::Message {
            topic,
            body
        }),
        Just(ServerFrame::Pong),
        "[^\x00]{0,128}".prop_map(|message| ServerFrame::Error { message }),
    ]
}

// --- Property tests ---

proptest! {
    /// Any valid Task survives an encode → decode round-trip.
    #[test]
    fn task_round_trip(task in arb_task()) {
        let json = serde_json::to_string(&task).expect("encode should succeed");
        let decoded: Task = serde_json::from_str(&json).expect("decode should succeed");
        prop_assert_eq!(task, decoded);
    }

    /// Any valid TaskEvent survives an encode → decode round-trip.
    #[test]
    fn event_round_trip(evt in arb_event()) {
        let json = event::encode(&evt).expect("encode should succeed");
        let decoded = event::decode(&json).expect("decode should succeed");
        prop_assert_eq!(evt, decoded);
    }

    /// Any valid ClientFrame survives an encode → decode round-trip.
    #[test]
    fn client_frame_round_trip(f in arb_client_frame()) {
        let json = frame::encode_client(&f).expect("encode should succeed");
        let decoded = frame::decode_client(&json).expect("decode should succeed");
        prop_assert_eq!(f, decoded);
    }

    /// Any valid ServerFrame survives an encode → decode round-trip.
    #[test]
    fn server_frame_round_trip(f in arb_server_frame()) {
        let json = frame::encode_server(&f).expect("encode should succeed");
        let decoded = frame::decode_server(&json).expect("decode should succeed");
        prop_assert_eq!(f, decoded);
    }

    /// Arbitrary text never panics the event decoder.
    #[test]
    fn event_decode_never_panics(text in "[^\x00]{0,256}") {
        let _ = event::decode(&text);
    }

    /// Arbitrary text never panics the frame decoders.
    #[test]
    fn frame_decode_never_panics(text in "[^\x00]{0,256}") {
        let _ = frame::decode_client(&text);
        let _ = frame::decode_server(&text);
    }

    /// Any unrecognized event `type` decodes to the no-op Unknown
    /// variant rather than an error.
    #[test]
    fn unknown_event_type_is_accepted(kind in "[A-Z]{3,12}") {
        prop_assume!(!matches!(kind.as_str(), "CREATED" | "UPDATED" | "DELETED"));
        let json = format!(r#"{{"type":"{kind}","taskId":1}}"#);
        let decoded = event::decode(&json).expect("unknown type must parse");
        prop_assert_eq!(decoded, TaskEvent::Unknown);
    }
}
