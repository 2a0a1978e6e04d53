//! Boardsync task board server -- REST API plus WebSocket push.
//!
//! Serves the authoritative task list over `/api/tasks` and broadcasts
//! every mutation to push subscribers connected at `/ws`.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:9100
//! cargo run --bin boardsync-server
//!
//! # Run on custom address
//! cargo run --bin boardsync-server -- --bind 127.0.0.1:8080
//!
//! # Or via environment variable
//! BOARDSYNC_ADDR=127.0.0.1:8080 cargo run --bin boardsync-server
//! ```

use std::sync::Arc;

use clap::Parser;

use boardsync_server::config::{ServerCliArgs, ServerConfig};
use boardsync_server::http::{self, AppState};
use boardsync_server::push::PushHub;

#[tokio::main]
async fn main() {
    let cli = ServerCliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match ServerConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing with the resolved log level.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(addr = %config.bind_addr, "starting boardsync server");

    let state = Arc::new(AppState {
        board: boardsync_server::board::BoardState::new(),
        hub: Arc::new(PushHub::with_heartbeat(config.heartbeat_ms)),
    });

    match http::start_server_with_state(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "board server listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "board server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start board server");
            std::process::exit(1);
        }
    }
}
