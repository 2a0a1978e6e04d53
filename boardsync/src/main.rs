//! Boardsync board watcher -- live view of a shared task board.
//!
//! Seeds the task list with a bulk fetch, then follows the push channel
//! and reprints the board whenever it changes. Connection state shows up
//! inline, so a dropped/reconnecting channel is visible at a glance.
//!
//! ```bash
//! # Watch the default local server
//! cargo run --bin boardsync
//!
//! # Watch a remote board
//! cargo run --bin boardsync -- --server-url http://board.internal:9100
//!
//! # Or via environment variable
//! BOARDSYNC_SERVER=http://board.internal:9100 cargo run --bin boardsync
//! ```

use std::path::Path;
use std::time::Duration;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;

use boardsync::config::{CliArgs, ClientConfig};
use boardsync::store::HttpTaskStore;
use boardsync::sync::{ConnectionState, SyncController};
use boardsync_proto::task::{Task, TaskStatus};

#[tokio::main]
async fn main() {
    let cli = CliArgs::parse();

    // Load and resolve configuration (CLI args > config file > defaults).
    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            ClientConfig::default()
        }
    };

    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    tracing::info!(server = %config.server_url, "boardsync watcher starting");

    let store = match HttpTaskStore::new(&config.server_url) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Invalid server URL: {e}");
            std::process::exit(1);
        }
    };

    let mut controller = SyncController::new(store, config.to_connection_config());
    if let Err(e) = controller.start().await {
        eprintln!("Could not fetch the board from {}: {e}", config.server_url);
        std::process::exit(1);
    }

    let mut last = controller.tasks();
    print_board(&last, controller.connection_state());

    let mut state_rx = controller.watch_connection_state();
    let mut ticker = tokio::time::interval(Duration::from_millis(500));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = controller.tasks();
                if now != last {
                    print_board(&now, controller.connection_state());
                    last = now;
                }
            }
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *state_rx.borrow_and_update();
                tracing::info!(%state, "connection state changed");
                println!("-- push channel: {state} --");
            }
        }
    }
}

/// Initialize logging, to a file via a non-blocking appender when
/// `--log-file` is given, otherwise to stderr.
///
/// Returns a [`WorkerGuard`] that must be held until shutdown so buffered
/// entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    if let Some(path) = file_path {
        let dir = path.parent()?;
        let file_name = path.file_name()?.to_str()?;
        let file_appender = tracing_appender::rolling::never(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::fmt()
            .with_writer(non_blocking)
            .with_env_filter(env_filter)
            .with_ansi(false)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter)
            .init();
        None
    }
}

/// Prints the board grouped into kanban columns.
fn print_board(tasks: &[Task], state: ConnectionState) {
    let live = if state == ConnectionState::Connected {
        "live"
    } else {
        "stale"
    };
    println!("\n== board ({} tasks, {live}) ==", tasks.len());
    for status in [TaskStatus::ToDo, TaskStatus::InProgress, TaskStatus::Done] {
        println!("{status}:");
        for task in tasks.iter().filter(|t| t.status == status) {
            println!("  [{}] {} ({})", task.id, task.title, task.priority);
        }
    }
}
