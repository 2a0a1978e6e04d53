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

//! Reconnect-policy tests: backoff, attempt budget, and explicit
//! disconnect.
//!
//! ## Disconnect simulation
//!
//! Aborting the board server's serve task does not close WebSocket
//! connections already handed to their own tasks. Instead we place a
//! **TCP proxy** between the client and the real server; killing the
//! proxy aborts every proxied connection task, which drops both TCP
//! streams and lets the client's WebSocket layer observe a disconnect.
//! Restarting the proxy on the same port lets the backoff path succeed.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use boardsync::store::{HttpTaskStore, TaskStore};
use boardsync::sync::{
    ConnectionConfig, ConnectionEvent, ConnectionManager, ConnectionState, ReconnectConfig,
    SyncController,
};
use boardsync_proto::task::{NewTask, Priority, TaskStatus};
use tokio::sync::mpsc;

// =============================================================================
// TCP proxy helper
// =============================================================================

/// A TCP proxy forwarding a client-facing port to a backend. `kill()`
/// aborts the acceptor and every per-connection task, severing all
/// proxied connections at once.
struct TcpProxy {
    /// Address clients should connect to (`127.0.0.1:<proxy_port>`).
    client_addr: String,
    /// The acceptor task handle.
    accept_handle: tokio::task::JoinHandle<()>,
    /// All per-connection task handles.
    conn_handles: Arc<Mutex<Vec<tokio::task::JoinHandle<()>>>>,
}

impl TcpProxy {
    /// Create a proxy from `proxy_port` to `backend_addr`.
    async fn new(proxy_port: u16, backend_addr: &str) -> Self {
        let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{proxy_port}"))
            .await
            .unwrap_or_else(|e| panic!("proxy: failed to bind port {proxy_port}: {e}"));
        let bound_addr = listener.local_addr().unwrap();
        let client_addr = format!("127.0.0.1:{}", bound_addr.port());
        let backend = backend_addr.to_string();
        let conn_handles: Arc<Mutex<Vec<tokio::task::JoinHandle<()>>>> =
            Arc::new(Mutex::new(Vec::new()));
        let conn_handles_clone = Arc::clone(&conn_handles);

        let accept_handle = tokio::spawn(async move {
            loop {
                let Ok((mut client_stream, _)) = listener.accept().await else {
                    break;
                };

                let backend = backend.clone();
                let conn_handle = tokio::spawn(async move {
                    let Ok(mut backend_stream) = tokio::net::TcpStream::connect(&backend).await
                    else {
                        return;
                    };
                    // No sub-tasks, so aborting this task drops both
                    // streams immediately.
                    let _ = tokio::io::copy_bidirectional(&mut client_stream, &mut backend_stream)
                        .await;
                });

                conn_handles_clone.lock().push(conn_handle);
            }
        });

        Self {
            client_addr,
            accept_handle,
            conn_handles,
        }
    }

    /// Kill the proxy, severing all connections immediately.
    fn kill(self) {
        self.accept_handle.abort();
        let handles = self.conn_handles.lock();
        for h in handles.iter() {
            h.abort();
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Find a free port by binding to 0 and recording the port.
async fn find_free_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind to port 0");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    // Brief pause to let the OS release the port.
    tokio::time::sleep(Duration::from_millis(50)).await;
    port
}

/// Start a board server on an OS-assigned port.
async fn start_board() -> (String, tokio::task::JoinHandle<()>) {
    let (addr, handle) = boardsync_server::http::start_server("127.0.0.1:0")
        .await
        .expect("failed to start board server");
    (addr.to_string(), handle)
}

/// Fast reconnect settings for tests.
fn fast_config(ws_url: &str) -> ConnectionConfig {
    let mut config = ConnectionConfig::new(ws_url);
    config.heartbeat = Duration::from_millis(200);
    config.connect_timeout = Duration::from_secs(2);
    config.reconnect = ReconnectConfig {
        base_delay: Duration::from_millis(100),
        max_attempts: 5,
    };
    config
}

/// Wait for a connection event matching the predicate, skipping others.
async fn wait_for_event<F>(
    rx: &mut mpsc::UnboundedReceiver<ConnectionEvent>,
    timeout: Duration,
    description: &str,
    pred: F,
) -> ConnectionEvent
where
    F: Fn(&ConnectionEvent) -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        let remaining = deadline - tokio::time::Instant::now();
        match tokio::time::timeout(remaining, rx.recv()).await {
            Ok(Some(evt)) if pred(&evt) => return evt,
            Ok(Some(_other)) => {}
            Ok(None) => panic!("event channel closed while waiting for {description}"),
            Err(_) => break,
        }
    }
    panic!("timeout waiting for {description}");
}

/// Poll the state watch until it reaches `want`.
async fn wait_for_state(manager: &ConnectionManager, want: ConnectionState, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if manager.state() == want {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timeout waiting for state {want}, still {}", manager.state());
}

// =============================================================================
// Test 1: reconnect through a restarted network path
// =============================================================================

/// After the network path is severed and restored, the supervisor
/// reconnects on its own and the controller re-subscribes, so pushed
/// mutations flow again without any caller involvement.
#[tokio::test]
async fn reconnects_and_resubscribes_after_partition() {
    let (board_addr, _board_handle) = start_board().await;
    let base_url = format!("http://{board_addr}");

    let proxy_port = find_free_port().await;
    let proxy = TcpProxy::new(proxy_port, &board_addr).await;
    let proxy_ws = format!("ws://{}/ws", proxy.client_addr);

    // REST goes straight to the board; only the push channel is proxied.
    let store = HttpTaskStore::new(&base_url).unwrap();
    let mut controller = SyncController::new(store, fast_config(&proxy_ws));
    controller.start().await.unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while controller.connection_state() != ConnectionState::Connected {
        assert!(tokio::time::Instant::now() < deadline, "never connected");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // Sever the path.
    proxy.kill();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while controller.connection_state() == ConnectionState::Connected {
        assert!(
            tokio::time::Instant::now() < deadline,
            "partition was never noticed"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // Restore the path on the same port; the backoff loop finds it.
    let _proxy2 = TcpProxy::new(proxy_port, &board_addr).await;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while controller.connection_state() != ConnectionState::Connected {
        assert!(tokio::time::Instant::now() < deadline, "never reconnected");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // The re-subscription happened inside the connected callback: a
    // fresh mutation arrives via push.
    let other = HttpTaskStore::new(&base_url).unwrap();
    let created = other
        .create(NewTask {
            title: "after the storm".to_string(),
            description: None,
            status: TaskStatus::ToDo,
            priority: Priority::Low,
        })
        .await
        .unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if controller.tasks().iter().any(|t| t.id == created.id) {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "push never resumed after reconnect; tasks: {:?}",
            controller.tasks()
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

// =============================================================================
// Test 2: attempt budget
// =============================================================================

/// With nothing listening, the supervisor makes exactly `max_attempts`
/// reconnect attempts and then goes `Disconnected` for good — silently,
/// with no error event.
#[tokio::test]
async fn reconnect_budget_exhausts_to_disconnected() {
    // A dead port: bound then released.
    let dead_port = find_free_port().await;
    let mut config = fast_config(&format!("ws://127.0.0.1:{dead_port}/ws"));
    config.reconnect.max_attempts = 2;

    let mut manager = ConnectionManager::new(config);
    let mut events = manager.take_events().unwrap();
    manager.connect();

    // One Closed per failed attempt: the initial dial plus two retries.
    for i in 0..3 {
        wait_for_event(
            &mut events,
            Duration::from_secs(5),
            &format!("Closed #{i}"),
            |evt| matches!(evt, ConnectionEvent::Closed),
        )
        .await;
    }

    wait_for_state(&manager, ConnectionState::Disconnected, Duration::from_secs(5)).await;

    // Terminal: no further attempts get scheduled.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert!(
        events.try_recv().is_err(),
        "no events may follow the exhausted budget"
    );

    // A new explicit connect() starts a fresh budget (still doomed here,
    // but it must at least leave Disconnected).
    manager.connect();
    assert_eq!(manager.state(), ConnectionState::Connecting);
}

// =============================================================================
// Test 3: disconnect cancels a pending backoff timer
// =============================================================================

/// `disconnect()` during the backoff wait cancels the scheduled attempt
/// immediately instead of letting the timer run out.
#[tokio::test]
async fn disconnect_cancels_pending_reconnect() {
    let dead_port = find_free_port().await;
    let mut config = fast_config(&format!("ws://127.0.0.1:{dead_port}/ws"));
    // Long enough that the test would time out if the sleep ran its course.
    config.reconnect.base_delay = Duration::from_secs(30);

    let mut manager = ConnectionManager::new(config);
    let mut events = manager.take_events().unwrap();
    manager.connect();

    wait_for_event(&mut events, Duration::from_secs(5), "first Closed", |evt| {
        matches!(evt, ConnectionEvent::Closed)
    })
    .await;
    wait_for_state(&manager, ConnectionState::Reconnecting, Duration::from_secs(5)).await;

    manager.disconnect();
    wait_for_state(&manager, ConnectionState::Disconnected, Duration::from_secs(2)).await;
}

// =============================================================================
// Test 4: explicit disconnect never re-enters the policy
// =============================================================================

/// Disconnecting a healthy session must not look like an abnormal
/// closure: the state goes straight to `Disconnected` and stays there.
#[tokio::test]
async fn explicit_disconnect_does_not_reconnect() {
    let (board_addr, _board_handle) = start_board().await;

    let mut manager = ConnectionManager::new(fast_config(&format!("ws://{board_addr}/ws")));
    let mut events = manager.take_events().unwrap();
    manager.connect();

    wait_for_event(&mut events, Duration::from_secs(5), "Connected", |evt| {
        matches!(evt, ConnectionEvent::Connected)
    })
    .await;

    manager.disconnect();
    wait_for_state(&manager, ConnectionState::Disconnected, Duration::from_secs(5)).await;

    // Long enough for a backoff attempt to have fired if one existed.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert!(
        events.try_recv().is_err(),
        "explicit disconnect must not emit closure events"
    );
}

// =============================================================================
// Test 5: duplicate connect is a no-op
// =============================================================================

/// `connect()` while a supervisor is already live must not open a second
/// transport or disturb the existing session.
#[tokio::test]
async fn connect_while_active_is_noop() {
    let (board_addr, _board_handle) = start_board().await;

    let mut manager = ConnectionManager::new(fast_config(&format!("ws://{board_addr}/ws")));
    let mut events = manager.take_events().unwrap();
    manager.connect();

    wait_for_event(&mut events, Duration::from_secs(5), "Connected", |evt| {
        matches!(evt, ConnectionEvent::Connected)
    })
    .await;

    manager.connect();
    manager.connect();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(manager.state(), ConnectionState::Connected);
    assert!(
        events.try_recv().is_err(),
        "duplicate connect must not produce events"
    );
}

// =============================================================================
// Test 6: heartbeat loss is an abnormal closure
// =============================================================================

/// A server that completes the handshake and then goes mute (no PONGs,
/// no frames at all) must be treated as gone once the idle window
/// elapses, entering the reconnect path.
#[tokio::test]
async fn silent_server_triggers_heartbeat_closure() {
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;

    use boardsync_proto::frame::{self, ClientFrame, ServerFrame};

    // A minimal push server that handshakes, then ignores everything.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                // Answer the CONNECT handshake, then fall silent.
                while let Some(Ok(msg)) = ws.next().await {
                    if let Message::Text(text) = msg
                        && let Ok(ClientFrame::Connect { .. }) =
                            frame::decode_client(text.as_str())
                    {
                        let connected = ServerFrame::Connected { heartbeat_ms: 100 };
                        let body = frame::encode_server(&connected).unwrap();
                        let _ = ws.send(Message::Text(body.into())).await;
                        // Keep reading so the TCP connection stays up,
                        // but never answer anything again.
                    }
                }
            });
        }
    });

    let mut config = fast_config(&format!("ws://{addr}/ws"));
    config.heartbeat = Duration::from_millis(100);
    config.reconnect.max_attempts = 1;

    let mut manager = ConnectionManager::new(config);
    let mut events = manager.take_events().unwrap();
    manager.connect();

    wait_for_event(&mut events, Duration::from_secs(5), "Connected", |evt| {
        matches!(evt, ConnectionEvent::Connected)
    })
    .await;

    // The idle watchdog fires after two silent intervals (~200ms).
    wait_for_event(
        &mut events,
        Duration::from_secs(5),
        "Closed after heartbeat loss",
        |evt| matches!(evt, ConnectionEvent::Closed),
    )
    .await;

    manager.disconnect();
}
