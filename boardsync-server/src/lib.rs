//! Boardsync board server library.
//!
//! Exposes the task board server for use in tests and embedding: an
//! in-memory task list behind a REST API, plus a WebSocket push hub that
//! broadcasts every mutation to topic subscribers.

pub mod board;
pub mod config;
pub mod http;
pub mod push;
