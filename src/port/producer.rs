//! Producer port: one configured connection to an upstream feed.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{InstrumentId, InstrumentRegistry, ProducerConfig, Tick};
use crate::error::ProducerError;

/// Connection status of a producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProducerStatus {
    /// Initial state, and the state after `close()` or a dropped session.
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// Session established; subscriptions can be pushed.
    Connected,
    /// The remote side rejected the session. Only a config change or an
    /// explicit `connect()` leaves this state.
    ConnectFailed,
}

impl fmt::Display for ProducerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProducerStatus::Disconnected => "disconnected",
            ProducerStatus::Connecting => "connecting",
            ProducerStatus::Connected => "connected",
            ProducerStatus::ConnectFailed => "connect_failed",
        };
        f.write_str(name)
    }
}

/// Serializable snapshot of a producer for the query surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProducerInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: ProducerStatus,
    pub status_changed_at: DateTime<Utc>,
    pub parameters: serde_json::Value,
}

/// Callbacks from producers into their owner.
pub trait ProducerSink: Send + Sync {
    fn on_status_changed(
        &self,
        producer_id: &str,
        previous: ProducerStatus,
        current: ProducerStatus,
    );

    fn on_tick(&self, tick: Tick);
}

/// A connection to one upstream market data source.
///
/// `connect` and `close` never block: connecting spawns the session task
/// and reports the outcome through the [`ProducerSink`].
#[async_trait]
pub trait MarketDataProducer: Send + Sync {
    fn id(&self) -> &str;

    /// Binding type name, e.g. `websocket`.
    fn producer_type(&self) -> &str;

    fn config(&self) -> &ProducerConfig;

    fn status(&self) -> ProducerStatus;

    fn status_changed_at(&self) -> DateTime<Utc>;

    /// Start a connection attempt. Failures surface as status changes.
    fn connect(&self);

    /// Tear down the current session, if any. Idempotent.
    fn close(&self);

    /// Whether this producer carries data for `instrument`.
    fn can_subscribe(&self, instrument: &InstrumentId) -> bool;

    /// Request data for every instrument in `instruments` this producer can
    /// serve. Instruments it cannot serve are ignored.
    async fn subscribe(&self, instruments: &[InstrumentId]) -> Result<(), ProducerError>;

    fn config_equals(&self, config: &ProducerConfig) -> bool {
        self.config() == config
    }

    fn info(&self) -> ProducerInfo {
        ProducerInfo {
            id: self.id().to_string(),
            kind: self.producer_type().to_string(),
            status: self.status(),
            status_changed_at: self.status_changed_at(),
            parameters: self.config().masked_parameters(),
        }
    }
}

/// Shared handles a producer needs from its owner.
#[derive(Clone)]
pub struct ProducerContext {
    pub sink: Arc<dyn ProducerSink>,
    pub registry: Arc<InstrumentRegistry>,
}

/// Builds producers from their declarative config.
pub trait ProducerFactory: Send + Sync {
    /// Construct a producer in the `Disconnected` state. Does not connect.
    fn create(
        &self,
        config: &ProducerConfig,
        context: &ProducerContext,
    ) -> Result<Arc<dyn MarketDataProducer>, ProducerError>;
}
