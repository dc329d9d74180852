//! Market data events flowing from producers to listeners.

use serde::Serialize;

use super::instrument::InstrumentId;

/// One market data update.
///
/// The payload is opaque to the service; only `timestamp` (epoch millis)
/// is used, for duplicate suppression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tick {
    pub producer_id: String,
    pub instrument: InstrumentId,
    pub timestamp: i64,
    pub payload: serde_json::Value,
}

impl Tick {
    pub fn new(
        producer_id: impl Into<String>,
        instrument: InstrumentId,
        timestamp: i64,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            producer_id: producer_id.into(),
            instrument,
            timestamp,
            payload,
        }
    }
}
