//! Connection manager: owns the push transport, its state machine,
//! heartbeat, and the bounded-backoff reconnect policy.
//!
//! The manager runs a supervisor task that dials the push endpoint,
//! performs the CONNECT/CONNECTED handshake, then serves the session
//! until it drops. Abnormal closures re-enter the dial loop with a
//! linearly growing delay, up to a fixed attempt budget; an explicit
//! [`ConnectionManager::disconnect`] is the only path that never
//! reconnects. All inbound frames and timer ticks are processed one at a
//! time on the supervisor task, so handlers observe events in exact
//! arrival order.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex as AsyncMutex, mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use boardsync_proto::frame::{self, ClientFrame, ServerFrame};

use super::subscription::SubscriptionRegistry;

/// Write half of the push WebSocket.
type WsSink =
    futures_util::stream::SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Read half of the push WebSocket.
type WsSource = futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Default heartbeat interval, each direction.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_millis(4000);

/// Default timeout for dialing and for the handshake reply.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Observable connection lifecycle state.
///
/// Driven only by the connection manager; collaborators read it through
/// [`ConnectionManager::watch_state`] for passive display (a "live"
/// indicator) and to decide when to fall back to direct fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport and no supervisor running.
    Disconnected,
    /// First dial in progress.
    Connecting,
    /// Handshake complete; events are flowing.
    Connected,
    /// Transport lost; a reconnect attempt is scheduled or in progress.
    Reconnecting,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting => write!(f, "reconnecting"),
        }
    }
}

/// Events emitted by the supervisor task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Handshake succeeded; subscriptions should be (re-)established now.
    Connected,
    /// The transport closed abnormally.
    Closed,
    /// The server rejected the push handshake. Emitted once; the closure
    /// is then handled by the normal reconnect policy.
    ProtocolError(String),
}

/// Commands from the manager (and registry) to the supervisor task.
#[derive(Debug)]
pub(crate) enum Command {
    /// Send a SUBSCRIBE frame for a topic.
    Subscribe(String),
    /// Send an UNSUBSCRIBE frame for a topic.
    Unsubscribe(String),
    /// Tear the connection down for good.
    Disconnect,
}

/// Reconnect policy knobs.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Base delay; attempt *n* (1-indexed) waits `base_delay * n`.
    pub base_delay: Duration,
    /// Maximum number of reconnect attempts before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(3000),
            max_attempts: 5,
        }
    }
}

/// Connection manager configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Push endpoint URL (e.g., `ws://127.0.0.1:9100/ws`).
    pub url: String,
    /// Client identity announced in the CONNECT frame.
    pub client_id: String,
    /// Heartbeat interval, each direction.
    pub heartbeat: Duration,
    /// Timeout for dialing and for the handshake reply.
    pub connect_timeout: Duration,
    /// Reconnect policy.
    pub reconnect: ReconnectConfig,
}

impl ConnectionConfig {
    /// Creates a config for the given push URL with default timings and
    /// a fresh client identity.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        let client_id = format!("board-{}", &uuid::Uuid::now_v7().to_string()[..8]);
        Self {
            url: url.into(),
            client_id,
            heartbeat: DEFAULT_HEARTBEAT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// How a session ended, as seen by the supervisor loop.
enum SessionEnd {
    /// Explicit disconnect: never reconnect.
    Shutdown,
    /// Dial or handshake failed; the session never reached `Connected`.
    Failed,
    /// The session was connected, then the transport was lost.
    Dropped,
}

/// Owns the push connection lifecycle.
///
/// One manager instance per sync controller; no two controllers share a
/// live transport. All methods return immediately — effects are observed
/// through the state watch and the event channel.
pub struct ConnectionManager {
    config: ConnectionConfig,
    registry: Arc<SubscriptionRegistry>,
    command_tx: mpsc::UnboundedSender<Command>,
    command_rx: Arc<AsyncMutex<mpsc::UnboundedReceiver<Command>>>,
    state_tx: watch::Sender<ConnectionState>,
    state_rx: watch::Receiver<ConnectionState>,
    event_tx: mpsc::UnboundedSender<ConnectionEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<ConnectionEvent>>,
}

impl ConnectionManager {
    /// Creates a manager (and its subscription registry) for the given
    /// configuration. Nothing is dialed until [`connect`](Self::connect).
    #[must_use]
    pub fn new(config: ConnectionConfig) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let registry = Arc::new(SubscriptionRegistry::new(
            command_tx.clone(),
            state_rx.clone(),
        ));

        Self {
            config,
            registry,
            command_tx,
            command_rx: Arc::new(AsyncMutex::new(command_rx)),
            state_tx,
            state_rx,
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    /// The registry holding this connection's topic subscriptions.
    #[must_use]
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Subscribes to connection state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Takes the connection event receiver. Can only be taken once.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<ConnectionEvent>> {
        self.event_rx.take()
    }

    /// Starts the supervisor task.
    ///
    /// No-op while a supervisor is already active (anything other than
    /// `Disconnected`), which prevents duplicate transports. Must be
    /// called from within a tokio runtime.
    pub fn connect(&self) {
        if self.state() != ConnectionState::Disconnected {
            tracing::debug!(state = %self.state(), "connect ignored, supervisor already active");
            return;
        }
        let _ = self.state_tx.send(ConnectionState::Connecting);

        tokio::spawn(run_supervisor(
            self.config.clone(),
            Arc::clone(&self.registry),
            self.state_tx.clone(),
            self.event_tx.clone(),
            Arc::clone(&self.command_rx),
        ));
    }

    /// Tears the connection down: unsubscribes every topic, closes the
    /// transport, and cancels any pending reconnect.
    ///
    /// This explicit path never triggers the reconnect policy. After it
    /// completes the manager can be reused with a new
    /// [`connect`](Self::connect), but subscriptions must be
    /// re-established by the caller.
    pub fn disconnect(&self) {
        if self.state() == ConnectionState::Disconnected {
            tracing::debug!("disconnect ignored, already disconnected");
            return;
        }
        let _ = self.command_tx.send(Command::Disconnect);
    }
}

/// Supervisor loop: one iteration per session, with linear backoff
/// between attempts and a hard attempt budget.
async fn run_supervisor(
    config: ConnectionConfig,
    registry: Arc<SubscriptionRegistry>,
    state_tx: watch::Sender<ConnectionState>,
    event_tx: mpsc::UnboundedSender<ConnectionEvent>,
    command_rx: Arc<AsyncMutex<mpsc::UnboundedReceiver<Command>>>,
) {
    let mut commands = command_rx.lock().await;
    let mut attempts: u32 = 0;

    loop {
        match run_session(&config, &registry, &state_tx, &event_tx, &mut commands).await {
            SessionEnd::Shutdown => {
                registry.clear();
                let _ = state_tx.send(ConnectionState::Disconnected);
                tracing::info!("push channel disconnected");
                return;
            }
            SessionEnd::Dropped => {
                // A successful handshake resets the attempt budget.
                attempts = 0;
            }
            SessionEnd::Failed => {}
        }

        // An explicit disconnect may have raced with the session ending;
        // honor it before scheduling anything.
        while let Ok(cmd) = commands.try_recv() {
            if matches!(cmd, Command::Disconnect) {
                registry.clear();
                let _ = state_tx.send(ConnectionState::Disconnected);
                tracing::info!("push channel disconnected");
                return;
            }
        }

        if attempts >= config.reconnect.max_attempts {
            // Silent degradation: observable only through the state.
            tracing::warn!(
                attempts,
                "reconnect budget exhausted, staying disconnected"
            );
            let _ = state_tx.send(ConnectionState::Disconnected);
            let _ = event_tx.send(ConnectionEvent::Closed);
            return;
        }
        attempts += 1;

        let _ = state_tx.send(ConnectionState::Reconnecting);
        let _ = event_tx.send(ConnectionEvent::Closed);

        let delay = config.reconnect.base_delay * attempts;
        tracing::info!(
            attempt = attempts,
            max = config.reconnect.max_attempts,
            delay = ?delay,
            "scheduling reconnect"
        );

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            cmd = commands.recv() => {
                match cmd {
                    Some(Command::Disconnect) | None => {
                        registry.clear();
                        let _ = state_tx.send(ConnectionState::Disconnected);
                        tracing::info!("reconnect cancelled by disconnect");
                        return;
                    }
                    Some(other) => {
                        tracing::debug!(command = ?other, "command ignored while reconnecting");
                    }
                }
            }
        }
    }
}

/// Dials, handshakes, and serves one session until it ends.
async fn run_session(
    config: &ConnectionConfig,
    registry: &Arc<SubscriptionRegistry>,
    state_tx: &watch::Sender<ConnectionState>,
    event_tx: &mpsc::UnboundedSender<ConnectionEvent>,
    commands: &mut mpsc::UnboundedReceiver<Command>,
) -> SessionEnd {
    tracing::debug!(url = %config.url, "dialing push endpoint");
    let ws_stream = match timeout(config.connect_timeout, connect_async(&config.url)).await {
        Ok(Ok((ws, _response))) => ws,
        Ok(Err(e)) => {
            tracing::warn!(url = %config.url, error = %e, "push connect failed");
            return SessionEnd::Failed;
        }
        Err(_) => {
            tracing::warn!(url = %config.url, "push connect timed out");
            return SessionEnd::Failed;
        }
    };

    let (mut write, mut read) = ws_stream.split();

    let hello = ClientFrame::Connect {
        client_id: config.client_id.clone(),
        heartbeat_ms: as_millis_u64(config.heartbeat),
    };
    if !send_frame(&mut write, &hello).await {
        return SessionEnd::Failed;
    }

    match wait_for_connected(&mut read, config.connect_timeout).await {
        Handshake::Accepted { heartbeat_ms } => {
            tracing::debug!(server_heartbeat_ms = heartbeat_ms, "handshake complete");
        }
        Handshake::Rejected(message) => {
            tracing::warn!(error = %message, "push handshake rejected");
            let _ = event_tx.send(ConnectionEvent::ProtocolError(message));
            return SessionEnd::Failed;
        }
        Handshake::TransportLost => return SessionEnd::Failed,
    }

    let _ = state_tx.send(ConnectionState::Connected);
    let _ = event_tx.send(ConnectionEvent::Connected);
    tracing::info!(url = %config.url, "push channel connected");

    let mut heartbeat = tokio::time::interval(config.heartbeat);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Two silent intervals and the transport is presumed dead.
    let idle_limit = config.heartbeat * 2;
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            cmd = commands.recv() => match cmd {
                Some(Command::Subscribe(topic)) => {
                    if !send_frame(&mut write, &ClientFrame::Subscribe { topic }).await {
                        return SessionEnd::Dropped;
                    }
                }
                Some(Command::Unsubscribe(topic)) => {
                    if !send_frame(&mut write, &ClientFrame::Unsubscribe { topic }).await {
                        return SessionEnd::Dropped;
                    }
                }
                Some(Command::Disconnect) | None => {
                    for topic in registry.topics() {
                        let _ = send_frame(&mut write, &ClientFrame::Unsubscribe { topic }).await;
                    }
                    let _ = send_frame(&mut write, &ClientFrame::Disconnect).await;
                    let _ = write.close().await;
                    return SessionEnd::Shutdown;
                }
            },
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    last_seen = Instant::now();
                    handle_server_frame(text.as_str(), registry);
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!("push channel closed by server");
                    return SessionEnd::Dropped;
                }
                Some(Ok(_)) => {
                    // Binary/ping/pong frames still count as liveness.
                    last_seen = Instant::now();
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "push channel read error");
                    return SessionEnd::Dropped;
                }
            },
            _ = heartbeat.tick() => {
                if last_seen.elapsed() > idle_limit {
                    tracing::warn!("heartbeat lost, treating as abnormal closure");
                    let _ = write.close().await;
                    return SessionEnd::Dropped;
                }
                if !send_frame(&mut write, &ClientFrame::Ping).await {
                    return SessionEnd::Dropped;
                }
            }
        }
    }
}

/// Handshake outcome while waiting for the server's answer to CONNECT.
enum Handshake {
    /// Server accepted; carries the server's heartbeat interval.
    Accepted {
        /// Interval the server will send heartbeats at.
        heartbeat_ms: u64,
    },
    /// Server answered with something other than CONNECTED.
    Rejected(String),
    /// The socket closed or errored before any answer.
    TransportLost,
}

/// Waits for the CONNECTED frame, within the handshake timeout.
async fn wait_for_connected(read: &mut WsSource, limit: Duration) -> Handshake {
    let deadline = Instant::now() + limit;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Handshake::Rejected("timed out waiting for CONNECTED".to_string());
        }

        match timeout(remaining, read.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => match frame::decode_server(text.as_str()) {
                Ok(ServerFrame::Connected { heartbeat_ms }) => {
                    return Handshake::Accepted { heartbeat_ms };
                }
                Ok(ServerFrame::Error { message }) => return Handshake::Rejected(message),
                Ok(other) => {
                    tracing::warn!(frame = ?other, "unexpected frame during handshake");
                    return Handshake::Rejected("unexpected frame during handshake".to_string());
                }
                Err(e) => {
                    return Handshake::Rejected(format!("malformed handshake frame: {e}"));
                }
            },
            Ok(Some(Ok(Message::Close(_)))) => return Handshake::TransportLost,
            Ok(None) => return Handshake::TransportLost,
            Ok(Some(Ok(_))) => {
                // Skip non-text frames during the handshake.
            }
            Ok(Some(Err(e))) => {
                tracing::warn!(error = %e, "push channel error during handshake");
                return Handshake::TransportLost;
            }
            Err(_) => {
                return Handshake::Rejected("timed out waiting for CONNECTED".to_string());
            }
        }
    }
}

/// Routes one inbound server frame. Malformed frames are logged and
/// dropped; they never affect the session.
fn handle_server_frame(text: &str, registry: &SubscriptionRegistry) {
    match frame::decode_server(text) {
        Ok(ServerFrame::Message { topic, body }) => registry.dispatch(&topic, &body),
        Ok(ServerFrame::Pong) => {
            // Liveness was already recorded by the read loop.
        }
        Ok(ServerFrame::Error { message }) => {
            tracing::warn!(error = %message, "server error frame");
        }
        Ok(ServerFrame::Connected { .. }) => {
            tracing::debug!("unexpected CONNECTED frame ignored");
        }
        Err(e) => {
            tracing::warn!(error = %e, "malformed server frame dropped");
        }
    }
}

/// Encodes and sends one client frame; `false` means the transport is gone.
async fn send_frame(write: &mut WsSink, value: &ClientFrame) -> bool {
    let text = match frame::encode_client(value) {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(error = %e, "failed to encode client frame");
            return false;
        }
    };
    if let Err(e) = write.send(Message::Text(text.into())).await {
        tracing::warn!(error = %e, "push channel send failed");
        return false;
    }
    true
}

/// Converts a duration to whole milliseconds for the wire.
fn as_millis_u64(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
