//! Downstream consumers of market data.

use crate::domain::Tick;

/// Receives ticks for the instruments it subscribed to.
///
/// Called from worker tasks; implementations must not block for long.
pub trait MarketDataListener: Send + Sync {
    fn on_market_data(&self, tick: &Tick);
}

/// Persists every tick the service receives, duplicates included.
pub trait TickRecorder: Send + Sync {
    fn record(&self, tick: &Tick);
}

/// Recorder that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRecorder;

impl TickRecorder for NullRecorder {
    fn record(&self, _tick: &Tick) {}
}
