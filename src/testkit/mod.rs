//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`producer`] - `ScriptedProducer` with queued connect outcomes, and a
//!   factory that keeps every producer it built.
//! - [`recording`] - Sink, listener and recorder doubles that keep what
//!   they receive.
//! - [`config`] - Producer config builders and canonical config files.

pub mod config;
pub mod producer;
pub mod recording;

use std::time::{Duration, Instant};

pub use producer::{ScriptedBehavior, ScriptedProducer, ScriptedProducerFactory};
pub use recording::{RecordingListener, RecordingRecorder, RecordingSink};

/// Poll `condition` until it holds. Panics after `timeout`.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + timeout;
    while !condition() {
        assert!(
            Instant::now() < deadline,
            "condition not met within {timeout:?}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
