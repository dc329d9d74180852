//! Doubles that record what they receive.

use parking_lot::Mutex;

use crate::domain::{InstrumentId, Tick};
use crate::port::{MarketDataListener, ProducerSink, ProducerStatus, TickRecorder};

/// [`ProducerSink`] that keeps every status change and tick.
#[derive(Default)]
pub struct RecordingSink {
    transitions: Mutex<Vec<(ProducerStatus, ProducerStatus)>>,
    ticks: Mutex<Vec<Tick>>,
}

impl RecordingSink {
    /// `(previous, current)` pairs in the order they were reported.
    pub fn transitions(&self) -> Vec<(ProducerStatus, ProducerStatus)> {
        self.transitions.lock().clone()
    }

    pub fn ticks(&self) -> Vec<Tick> {
        self.ticks.lock().clone()
    }
}

impl ProducerSink for RecordingSink {
    fn on_status_changed(&self, _producer_id: &str, previous: ProducerStatus, current: ProducerStatus) {
        self.transitions.lock().push((previous, current));
    }

    fn on_tick(&self, tick: Tick) {
        self.ticks.lock().push(tick);
    }
}

/// Listener that keeps every delivered tick.
#[derive(Default)]
pub struct RecordingListener {
    ticks: Mutex<Vec<Tick>>,
}

impl RecordingListener {
    pub fn ticks(&self) -> Vec<Tick> {
        self.ticks.lock().clone()
    }

    /// Timestamps delivered for `instrument`, in delivery order.
    pub fn timestamps(&self, instrument: &InstrumentId) -> Vec<i64> {
        self.ticks
            .lock()
            .iter()
            .filter(|t| &t.instrument == instrument)
            .map(|t| t.timestamp)
            .collect()
    }
}

impl MarketDataListener for RecordingListener {
    fn on_market_data(&self, tick: &Tick) {
        self.ticks.lock().push(tick.clone());
    }
}

/// Recorder that keeps every persisted tick.
#[derive(Default)]
pub struct RecordingRecorder {
    ticks: Mutex<Vec<Tick>>,
}

impl RecordingRecorder {
    pub fn ticks(&self) -> Vec<Tick> {
        self.ticks.lock().clone()
    }
}

impl TickRecorder for RecordingRecorder {
    fn record(&self, tick: &Tick) {
        self.ticks.lock().push(tick.clone());
    }
}
