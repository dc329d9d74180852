//! Scripted producer for orchestration tests.
//!
//! Each `connect()` pops the next [`ScriptedBehavior`] from the producer's
//! script and falls back to the behavior from its config when the script
//! is exhausted.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Notify;

use crate::adapter::producer::{decode_parameters, serves_exchange, ProducerState, Session};
use crate::domain::{Exchange, InstrumentId, ProducerConfig, Tick};
use crate::error::ProducerError;
use crate::port::{
    MarketDataProducer, ProducerContext, ProducerFactory, ProducerSink, ProducerStatus,
};

pub const TYPE_NAME: &str = "scripted";

/// Outcome of one connect attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptedBehavior {
    /// Handshake succeeds; the session lasts until `drop_connection`.
    #[default]
    Connect,
    /// Remote side rejects the session.
    Reject,
    /// Never completes the handshake.
    Hang,
}

#[derive(Debug, Default, Deserialize)]
struct ScriptedParams {
    #[serde(default)]
    behavior: ScriptedBehavior,
    #[serde(default)]
    fail_construction: bool,
    #[serde(default)]
    exchanges: Vec<Exchange>,
}

pub struct ScriptedProducer {
    state: Arc<ProducerState>,
    default_behavior: ScriptedBehavior,
    exchanges: Vec<Exchange>,
    script: Mutex<VecDeque<ScriptedBehavior>>,
    connects: AtomicU32,
    subscribe_calls: Mutex<Vec<Vec<InstrumentId>>>,
    session: Arc<Mutex<Option<Session>>>,
    hangup: Arc<Notify>,
}

impl ScriptedProducer {
    pub fn new(config: ProducerConfig, sink: Arc<dyn ProducerSink>) -> Result<Self, ProducerError> {
        let params: ScriptedParams = decode_parameters(&config)?;
        if params.fail_construction {
            return Err(ProducerError::ConstructionFailed {
                id: config.id.clone(),
                reason: "scripted construction failure".into(),
            });
        }
        Ok(Self {
            state: ProducerState::new(config, sink),
            default_behavior: params.behavior,
            exchanges: params.exchanges,
            script: Mutex::new(VecDeque::new()),
            connects: AtomicU32::new(0),
            subscribe_calls: Mutex::new(Vec::new()),
            session: Arc::new(Mutex::new(None)),
            hangup: Arc::new(Notify::new()),
        })
    }

    /// Queue behaviors for the next connect attempts.
    pub fn script(&self, behaviors: impl IntoIterator<Item = ScriptedBehavior>) {
        self.script.lock().extend(behaviors);
    }

    /// Number of `connect()` calls, ignored ones included.
    pub fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    /// Instrument lists passed to `subscribe`, in call order.
    pub fn subscribe_calls(&self) -> Vec<Vec<InstrumentId>> {
        self.subscribe_calls.lock().clone()
    }

    /// Emit a tick through the current session. Returns `false` without a
    /// live session.
    pub fn push_tick(&self, instrument: &InstrumentId, timestamp: i64) -> bool {
        let session = self.session.lock().clone();
        session.map_or(false, |session| {
            let tick = Tick::new(
                session.producer_id(),
                instrument.clone(),
                timestamp,
                json!({ "last_price": 1.0 }),
            );
            session.emit(tick)
        })
    }

    /// End the established session as if the remote side hung up.
    pub fn drop_connection(&self) {
        self.hangup.notify_one();
    }
}

#[async_trait]
impl MarketDataProducer for ScriptedProducer {
    fn id(&self) -> &str {
        self.state.id()
    }

    fn producer_type(&self) -> &str {
        TYPE_NAME
    }

    fn config(&self) -> &ProducerConfig {
        self.state.config()
    }

    fn status(&self) -> ProducerStatus {
        self.state.status()
    }

    fn status_changed_at(&self) -> DateTime<Utc> {
        self.state.status_changed_at()
    }

    fn connect(&self) {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let behavior = self
            .script
            .lock()
            .pop_front()
            .unwrap_or(self.default_behavior);
        let slot = Arc::clone(&self.session);
        let hangup = Arc::clone(&self.hangup);
        self.state.connect_with(move |session| async move {
            match behavior {
                ScriptedBehavior::Connect => {
                    *slot.lock() = Some(session.clone());
                    session.mark_connected();
                    hangup.notified().await;
                    Ok(())
                }
                ScriptedBehavior::Reject => {
                    Err(ProducerError::ConnectFailed("scripted rejection".into()))
                }
                ScriptedBehavior::Hang => {
                    std::future::pending::<()>().await;
                    Ok(())
                }
            }
        });
    }

    fn close(&self) {
        self.state.close();
    }

    fn can_subscribe(&self, instrument: &InstrumentId) -> bool {
        serves_exchange(&self.exchanges, instrument)
    }

    async fn subscribe(&self, instruments: &[InstrumentId]) -> Result<(), ProducerError> {
        self.subscribe_calls.lock().push(instruments.to_vec());
        Ok(())
    }
}

/// Factory that builds [`ScriptedProducer`]s and keeps a handle to each.
///
/// Parameters understood: `behavior` (`connect`, `reject`, `hang`),
/// `fail_construction` and `exchanges`.
#[derive(Default)]
pub struct ScriptedProducerFactory {
    created: Mutex<Vec<Arc<ScriptedProducer>>>,
    failures: AtomicU32,
}

impl ScriptedProducerFactory {
    /// Make the next `count` constructions fail, whatever their config.
    pub fn fail_next(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Every producer built so far, in creation order.
    pub fn created(&self) -> Vec<Arc<ScriptedProducer>> {
        self.created.lock().clone()
    }

    /// Most recently built producer with `id`.
    pub fn latest(&self, id: &str) -> Option<Arc<ScriptedProducer>> {
        self.created.lock().iter().rev().find(|p| p.id() == id).cloned()
    }
}

impl ProducerFactory for ScriptedProducerFactory {
    fn create(
        &self,
        config: &ProducerConfig,
        context: &ProducerContext,
    ) -> Result<Arc<dyn MarketDataProducer>, ProducerError> {
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ProducerError::ConstructionFailed {
                id: config.id.clone(),
                reason: "scripted construction failure".into(),
            });
        }
        let producer = Arc::new(ScriptedProducer::new(
            config.clone(),
            Arc::clone(&context.sink),
        )?);
        self.created.lock().push(Arc::clone(&producer));
        Ok(producer as Arc<dyn MarketDataProducer>)
    }
}
