//! Testing utilities for cancellation flows.
//!
//! This module provides:
//! - An in-memory run store with scripted worker transitions
//! - A recording command channel
//!
//! Poll loops sleep through `tokio::time`; tests run them under
//! `#[tokio::test(start_paused = true)]` so no real time passes.

mod channel;
mod store;

pub use channel::{PublishedCommand, RecordingCommandChannel};
pub use store::InMemoryRunStore;
