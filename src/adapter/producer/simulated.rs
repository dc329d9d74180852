//! In-process random-walk feed.
//!
//! Useful for demos and soak tests: no network, deterministic with a
//! fixed `seed`, and able to simulate slow or rejected connects.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::state::{ProducerState, Session};
use super::{decode_parameters, serves_exchange};
use crate::domain::{Exchange, InstrumentId, ProducerConfig, Tick};
use crate::error::ProducerError;
use crate::port::{MarketDataProducer, ProducerSink, ProducerStatus};

pub const TYPE_NAME: &str = "simulated";

const STARTING_PRICE: f64 = 100.0;

/// Parameters of a `simulated` producer.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulatedParams {
    /// Venues served; empty means all.
    #[serde(default)]
    pub exchanges: Vec<Exchange>,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default)]
    pub connect_delay_ms: u64,
    /// Reject every connect attempt.
    #[serde(default)]
    pub fail_connect: bool,
    #[serde(default)]
    pub seed: Option<u64>,
}

const fn default_interval_ms() -> u64 {
    500
}

pub struct SimulatedProducer {
    state: Arc<ProducerState>,
    params: SimulatedParams,
    subscribed: Arc<RwLock<BTreeSet<InstrumentId>>>,
}

impl SimulatedProducer {
    pub fn new(config: ProducerConfig, sink: Arc<dyn ProducerSink>) -> Result<Self, ProducerError> {
        let params: SimulatedParams = decode_parameters(&config)?;
        if params.interval_ms == 0 {
            return Err(ProducerError::ConstructionFailed {
                id: config.id.clone(),
                reason: "interval_ms must be greater than 0".into(),
            });
        }
        Ok(Self {
            state: ProducerState::new(config, sink),
            params,
            subscribed: Arc::new(RwLock::new(BTreeSet::new())),
        })
    }

    #[must_use]
    pub fn subscribed(&self) -> Vec<InstrumentId> {
        self.subscribed.read().iter().cloned().collect()
    }
}

async fn run_session(
    session: Session,
    params: SimulatedParams,
    subscribed: Arc<RwLock<BTreeSet<InstrumentId>>>,
) -> Result<(), ProducerError> {
    if params.connect_delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(params.connect_delay_ms)).await;
    }
    if params.fail_connect {
        return Err(ProducerError::ConnectFailed("simulated rejection".into()));
    }
    // a fresh session starts without subscriptions, like a real gateway
    if session.is_current() {
        subscribed.write().clear();
    }
    session.mark_connected();

    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut books: HashMap<InstrumentId, (f64, i64)> = HashMap::new();
    let mut ticker = tokio::time::interval(Duration::from_millis(params.interval_ms));

    loop {
        ticker.tick().await;
        let instruments: Vec<InstrumentId> = subscribed.read().iter().cloned().collect();
        let now = Utc::now().timestamp_millis();
        for instrument in instruments {
            let (price, last_ts) = books
                .entry(instrument.clone())
                .or_insert((STARTING_PRICE, 0));
            *price = (*price * (1.0 + rng.gen_range(-0.002..0.002))).max(0.01);
            // strictly increasing per instrument even within one millisecond
            *last_ts = now.max(*last_ts + 1);
            let payload = json!({
                "last_price": (*price * 100.0).round() / 100.0,
                "volume": rng.gen_range(1..500),
            });
            let tick = Tick::new(session.producer_id(), instrument, *last_ts, payload);
            if !session.emit(tick) {
                debug!(producer = %session.producer_id(), "Stale session, stopping feed");
                return Ok(());
            }
        }
    }
}

#[async_trait]
impl MarketDataProducer for SimulatedProducer {
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
        let params = self.params.clone();
        let subscribed = Arc::clone(&self.subscribed);
        self.state
            .connect_with(move |session| run_session(session, params, subscribed));
    }

    fn close(&self) {
        self.state.close();
    }

    fn can_subscribe(&self, instrument: &InstrumentId) -> bool {
        serves_exchange(&self.params.exchanges, instrument)
    }

    async fn subscribe(&self, instruments: &[InstrumentId]) -> Result<(), ProducerError> {
        let mut subscribed = self.subscribed.write();
        let before = subscribed.len();
        subscribed.extend(
            instruments
                .iter()
                .filter(|i| self.can_subscribe(i))
                .cloned(),
        );
        debug!(
            producer = %self.state.id(),
            added = subscribed.len() - before,
            total = subscribed.len(),
            "Subscribed instruments"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::InstrumentRegistry;
    use crate::testkit::{wait_until, RecordingSink};

    fn config() -> ProducerConfig {
        ProducerConfig::new("sim", TYPE_NAME)
            .with_parameter("interval_ms", 5)
            .with_parameter("seed", 7)
            .with_parameter("exchanges", vec!["SHFE"])
    }

    #[test]
    fn rejects_zero_interval() {
        let sink = Arc::new(RecordingSink::default());
        let config = ProducerConfig::new("sim", TYPE_NAME).with_parameter("interval_ms", 0);
        assert!(matches!(
            SimulatedProducer::new(config, sink),
            Err(ProducerError::ConstructionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn emits_ticks_for_subscribed_instruments() {
        let registry = InstrumentRegistry::new();
        let ru = registry.intern_exchange(Exchange::SHFE, "ru1901", None);
        let stock = registry.intern_exchange(Exchange::SSE, "600000", None);
        let sink = Arc::new(RecordingSink::default());
        let producer = SimulatedProducer::new(config(), sink.clone()).unwrap();

        producer.connect();
        wait_until(Duration::from_secs(1), || {
            producer.status() == ProducerStatus::Connected
        })
        .await;
        producer.subscribe(&[ru.clone(), stock.clone()]).await.unwrap();
        assert_eq!(producer.subscribed(), vec![ru.clone()]);

        wait_until(Duration::from_secs(2), || sink.ticks().len() >= 3).await;
        producer.close();

        let ticks = sink.ticks();
        assert!(ticks.iter().all(|t| t.instrument == ru && t.producer_id == "sim"));
        assert!(ticks.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(producer.status(), ProducerStatus::Disconnected);
    }

    #[tokio::test]
    async fn reconnect_starts_without_subscriptions() {
        let registry = InstrumentRegistry::new();
        let ru = registry.intern_exchange(Exchange::SHFE, "ru1901", None);
        let sink = Arc::new(RecordingSink::default());
        let producer = SimulatedProducer::new(config(), sink).unwrap();
        let connected = || producer.status() == ProducerStatus::Connected;

        producer.connect();
        wait_until(Duration::from_secs(1), connected).await;
        producer.subscribe(&[ru.clone()]).await.unwrap();
        assert_eq!(producer.subscribed(), vec![ru]);

        producer.close();
        producer.connect();
        wait_until(Duration::from_secs(1), connected).await;
        assert!(producer.subscribed().is_empty());
        producer.close();
    }

    #[tokio::test]
    async fn fail_connect_ends_in_connect_failed() {
        let sink = Arc::new(RecordingSink::default());
        let config = config().with_parameter("fail_connect", true);
        let producer = SimulatedProducer::new(config, sink).unwrap();

        producer.connect();
        wait_until(Duration::from_secs(1), || {
            producer.status() == ProducerStatus::ConnectFailed
        })
        .await;
    }
}
