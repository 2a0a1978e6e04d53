//! HTTP surface: REST task routes and the WebSocket upgrade endpoint.
//!
//! The REST API is the request-response channel (bulk fetch + CRUD); the
//! `/ws` endpoint upgrades to the push protocol served by
//! [`crate::push`]. Every successful mutation is broadcast to push
//! subscribers after the store commit, in commit order.

use std::sync::Arc;

use axum::Json;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use boardsync_proto::task::{NewTask, Task, TaskId, TaskUpdate};

use crate::board::{BoardError, BoardState};
use crate::push::{self, PushHub};

/// Shared server state: the authoritative board plus the push hub.
pub struct AppState {
    /// The task list of record.
    pub board: BoardState,
    /// Topic fan-out for push subscribers. Held behind its own `Arc` so
    /// socket tasks can carry a handle independent of the router state.
    pub hub: Arc<PushHub>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    /// Creates empty state with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            board: BoardState::new(),
            hub: Arc::new(PushHub::new()),
        }
    }
}

/// JSON error body returned by failing REST calls.
#[derive(Debug, serde::Serialize)]
struct ErrorBody {
    message: String,
}

/// Builds the axum router for the given state.
#[must_use]
pub fn router(state: Arc<AppState>) -> axum::Router {
    axum::Router::new()
        .route(
            "/api/tasks",
            axum::routing::get(list_tasks).post(create_task),
        )
        .route(
            "/api/tasks/{id}",
            axum::routing::get(get_task)
                .put(update_task)
                .delete(delete_task),
        )
        .route("/ws", axum::routing::get(ws_handler))
        .with_state(state)
}

/// Starts the server with fresh state.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(AppState::new())).await
}

/// Starts the server with pre-configured state.
///
/// Returns the bound address (useful with port 0) and the serve task's
/// [`tokio::task::JoinHandle`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<AppState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "board server error");
        }
    });

    Ok((bound_addr, handle))
}

/// `GET /api/tasks` — bulk fetch of the full task list.
async fn list_tasks(State(state): State<Arc<AppState>>) -> Json<Vec<Task>> {
    Json(state.board.list().await)
}

/// `GET /api/tasks/{id}`.
async fn get_task(State(state): State<Arc<AppState>>, Path(id): Path<u64>) -> Response {
    match state.board.get(TaskId::new(id)).await {
        Some(task) => Json(task).into_response(),
        None => error_response(&BoardError::NotFound(TaskId::new(id))),
    }
}

/// `POST /api/tasks` — create, then broadcast `CREATED`.
async fn create_task(State(state): State<Arc<AppState>>, Json(new): Json<NewTask>) -> Response {
    match state.board.create(new).await {
        Ok((task, event)) => {
            state.hub.broadcast_event(&event).await;
            (StatusCode::CREATED, Json(task)).into_response()
        }
        Err(e) => error_response(&e),
    }
}

/// `PUT /api/tasks/{id}` — full update, then broadcast `UPDATED`.
async fn update_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(update): Json<TaskUpdate>,
) -> Response {
    match state.board.update(TaskId::new(id), update).await {
        Ok((task, event)) => {
            state.hub.broadcast_event(&event).await;
            Json(task).into_response()
        }
        Err(e) => error_response(&e),
    }
}

/// `DELETE /api/tasks/{id}` — remove, then broadcast `DELETED`.
async fn delete_task(State(state): State<Arc<AppState>>, Path(id): Path<u64>) -> Response {
    match state.board.remove(TaskId::new(id)).await {
        Ok(event) => {
            state.hub.broadcast_event(&event).await;
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => error_response(&e),
    }
}

/// Upgrades `GET /ws` to a push-protocol session.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let hub = Arc::clone(&state.hub);
    ws.on_upgrade(move |socket| push::handle_socket(socket, hub))
}

/// Maps a board error to its HTTP status + JSON body.
fn error_response(err: &BoardError) -> Response {
    let status = match err {
        BoardError::NotFound(_) => StatusCode::NOT_FOUND,
        BoardError::VersionConflict { .. } => StatusCode::CONFLICT,
        BoardError::TitleEmpty | BoardError::TitleTooLong => StatusCode::BAD_REQUEST,
    };
    (
        status,
        Json(ErrorBody {
            message: err.to_string(),
        }),
    )
        .into_response()
}
