//! Connection state machine shared by every producer binding.
//!
//! ```text
//! Disconnected ──connect()──▶ Connecting ──handshake ok──▶ Connected
//!      ▲                          │                          │
//!      │                          └──rejected──▶ ConnectFailed
//!      └───────── session ended / close() ───────────────────┘
//! ```
//!
//! Each `connect()` starts a new session generation. `close()` bumps the
//! generation, so a session task that is still winding down can neither
//! change the status nor emit ticks afterwards.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::{ProducerConfig, Tick};
use crate::error::ProducerError;
use crate::port::{ProducerSink, ProducerStatus};

struct StatusCell {
    status: ProducerStatus,
    changed_at: DateTime<Utc>,
    generation: u64,
}

/// Status, timestamps and the connection slot of one producer.
pub struct ProducerState {
    config: ProducerConfig,
    sink: Arc<dyn ProducerSink>,
    cell: Mutex<StatusCell>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ProducerState {
    pub fn new(config: ProducerConfig, sink: Arc<dyn ProducerSink>) -> Arc<Self> {
        Arc::new(Self {
            config,
            sink,
            cell: Mutex::new(StatusCell {
                status: ProducerStatus::Disconnected,
                changed_at: Utc::now(),
                generation: 0,
            }),
            task: Mutex::new(None),
        })
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &ProducerConfig {
        &self.config
    }

    pub fn status(&self) -> ProducerStatus {
        self.cell.lock().status
    }

    pub fn status_changed_at(&self) -> DateTime<Utc> {
        self.cell.lock().changed_at
    }

    /// Move to `next` if `guard` accepts the current cell. The sink is
    /// notified after the lock is released.
    fn transition(&self, next: ProducerStatus, guard: impl FnOnce(&StatusCell) -> bool) -> bool {
        let previous = {
            let mut cell = self.cell.lock();
            if !guard(&cell) || cell.status == next {
                return false;
            }
            let previous = cell.status;
            cell.status = next;
            cell.changed_at = Utc::now();
            previous
        };
        info!(
            producer = %self.config.id,
            from = %previous,
            to = %next,
            "Producer status changed"
        );
        self.sink.on_status_changed(&self.config.id, previous, next);
        true
    }

    /// Start a session unless one is already connecting or connected.
    ///
    /// `run` drives the session. It resolves `Ok` when the remote side ends
    /// the session; an error of kind [`ProducerError::ConnectFailed`] before
    /// the session is established moves to `ConnectFailed`, anything else
    /// to `Disconnected`.
    pub fn connect_with<F, Fut>(self: &Arc<Self>, run: F)
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = Result<(), ProducerError>> + Send + 'static,
    {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(producer = %self.config.id, "No async runtime, cannot connect");
            return;
        };

        let generation = {
            let mut cell = self.cell.lock();
            if matches!(
                cell.status,
                ProducerStatus::Connecting | ProducerStatus::Connected
            ) {
                debug!(producer = %self.config.id, status = %cell.status, "Connect ignored");
                return;
            }
            cell.generation += 1;
            cell.generation
        };
        if !self.transition(ProducerStatus::Connecting, |cell| {
            cell.generation == generation
        }) {
            return;
        }

        let session = Session {
            state: Arc::clone(self),
            generation,
        };
        let future = run(session.clone());
        let handle = runtime.spawn(async move {
            let result = future.await;
            session.finish(result);
        });

        let mut task = self.task.lock();
        if let Some(previous) = task.replace(handle) {
            previous.abort();
        }
        // a close() that ran before the handle was stored found nothing to abort
        if self.cell.lock().generation != generation {
            if let Some(stale) = task.take() {
                stale.abort();
                debug!(producer = %self.config.id, "Session closed while starting, aborted");
            }
        }
    }

    /// Generation of the newest session; bumped by every connect and close.
    pub fn generation(&self) -> u64 {
        self.cell.lock().generation
    }

    /// Drop the current session, if any, and return to `Disconnected`.
    pub fn close(&self) {
        {
            let mut cell = self.cell.lock();
            cell.generation += 1;
        }
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
            debug!(producer = %self.config.id, "Session task aborted");
        }
        self.transition(ProducerStatus::Disconnected, |_| true);
    }
}

/// Handle given to a session task. Every operation is a no-op once the
/// session has been superseded or closed.
#[derive(Clone)]
pub struct Session {
    state: Arc<ProducerState>,
    generation: u64,
}

impl Session {
    pub fn producer_id(&self) -> &str {
        self.state.id()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.state.cell.lock().generation == self.generation
    }

    /// Report a successful handshake.
    pub fn mark_connected(&self) -> bool {
        self.state.transition(ProducerStatus::Connected, |cell| {
            cell.generation == self.generation && cell.status == ProducerStatus::Connecting
        })
    }

    /// Forward a tick to the sink. Returns `false` once the session is stale.
    pub fn emit(&self, tick: Tick) -> bool {
        if !self.is_current() {
            return false;
        }
        self.state.sink.on_tick(tick);
        true
    }

    fn finish(&self, result: Result<(), ProducerError>) {
        let current = |cell: &StatusCell| cell.generation == self.generation;
        match result {
            Err(ProducerError::ConnectFailed(reason)) => {
                warn!(producer = %self.producer_id(), %reason, "Connect failed");
                self.state.transition(ProducerStatus::ConnectFailed, |cell| {
                    current(cell) && cell.status == ProducerStatus::Connecting
                });
            }
            Err(e) => {
                warn!(producer = %self.producer_id(), error = %e, "Session ended with error");
                self.disconnected(current);
            }
            Ok(()) => {
                info!(producer = %self.producer_id(), "Session ended");
                self.disconnected(current);
            }
        }
    }

    fn disconnected(&self, current: impl Fn(&StatusCell) -> bool) {
        self.state.transition(ProducerStatus::Disconnected, |cell| {
            current(cell) && cell.status != ProducerStatus::ConnectFailed
        });
    }
}
