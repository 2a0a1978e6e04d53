//! Shared protocol definitions for the Boardsync wire format.

pub mod codec;
pub mod event;
pub mod frame;
pub mod task;
