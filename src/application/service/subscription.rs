//! Listener registry with per-instrument duplicate suppression.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::domain::{InstrumentId, Tick};
use crate::port::MarketDataListener;

/// Move `cell` forward to `timestamp` if it is strictly newer.
fn advance(cell: &AtomicI64, timestamp: i64) -> bool {
    cell.fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
        (timestamp > last).then_some(timestamp)
    })
    .is_ok()
}

struct Holder {
    listeners: Vec<Arc<dyn MarketDataListener>>,
    last_timestamp: AtomicI64,
    delivered: Arc<AtomicI64>,
}

impl Holder {
    fn new() -> Self {
        Self {
            listeners: Vec::new(),
            last_timestamp: AtomicI64::new(i64::MIN),
            delivered: Arc::new(AtomicI64::new(i64::MIN)),
        }
    }
}

/// An accepted tick on its way to the listeners.
pub struct Dispatch {
    pub listeners: Vec<Arc<dyn MarketDataListener>>,
    delivered: Arc<AtomicI64>,
}

impl Dispatch {
    /// Claim delivery of `timestamp`. Fails when a newer tick for the same
    /// instrument already reached the listeners.
    pub fn claim(&self, timestamp: i64) -> bool {
        advance(&self.delivered, timestamp)
    }
}

/// Instruments with at least one listener.
///
/// Accepting a tick only takes the read lock; the last-seen timestamp is
/// advanced atomically so concurrent producers cannot both win.
#[derive(Default)]
pub struct SubscriptionRegistry {
    holders: RwLock<HashMap<InstrumentId, Holder>>,
}

impl SubscriptionRegistry {
    /// Register `listener` for `instruments`. Returns the instruments that
    /// had no listener before.
    pub fn add(
        &self,
        listener: &Arc<dyn MarketDataListener>,
        instruments: &[InstrumentId],
    ) -> Vec<InstrumentId> {
        let mut holders = self.holders.write();
        let mut newly = Vec::new();
        for instrument in instruments {
            let holder = holders.entry(instrument.clone()).or_insert_with(|| {
                newly.push(instrument.clone());
                Holder::new()
            });
            if !holder.listeners.iter().any(|l| Arc::ptr_eq(l, listener)) {
                holder.listeners.push(Arc::clone(listener));
            }
        }
        newly
    }

    /// Listeners to notify for `tick`, or `None` when nobody listens or the
    /// tick is not newer than the last one accepted for its instrument.
    ///
    /// Acceptance and delivery are separate steps; the returned
    /// [`Dispatch`] must be claimed right before the listeners run.
    pub fn accept(&self, tick: &Tick) -> Option<Dispatch> {
        let holders = self.holders.read();
        let holder = holders.get(&tick.instrument)?;
        if !advance(&holder.last_timestamp, tick.timestamp) {
            return None;
        }
        Some(Dispatch {
            listeners: holder.listeners.clone(),
            delivered: Arc::clone(&holder.delivered),
        })
    }

    #[must_use]
    pub fn instruments(&self) -> Vec<InstrumentId> {
        self.holders.read().keys().cloned().collect()
    }

    #[must_use]
    pub fn last_timestamp(&self, instrument: &InstrumentId) -> Option<i64> {
        let holders = self.holders.read();
        let last = holders.get(instrument)?.last_timestamp.load(Ordering::Acquire);
        (last != i64::MIN).then_some(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Exchange, InstrumentRegistry};
    use crate::testkit::RecordingListener;

    fn tick(instrument: &InstrumentId, timestamp: i64) -> Tick {
        Tick::new("p1", instrument.clone(), timestamp, serde_json::Value::Null)
    }

    #[test]
    fn add_reports_only_new_instruments() {
        let registry = InstrumentRegistry::new();
        let ru = registry.intern_exchange(Exchange::SHFE, "ru1901", None);
        let cu = registry.intern_exchange(Exchange::SHFE, "cu1901", None);
        let subscriptions = SubscriptionRegistry::default();
        let a: Arc<dyn MarketDataListener> = Arc::new(RecordingListener::default());
        let b: Arc<dyn MarketDataListener> = Arc::new(RecordingListener::default());

        assert_eq!(subscriptions.add(&a, &[ru.clone()]), vec![ru.clone()]);
        assert_eq!(subscriptions.add(&b, &[ru.clone(), cu.clone()]), vec![cu.clone()]);
        assert!(subscriptions.add(&a, &[ru.clone()]).is_empty());

        let dispatch = subscriptions.accept(&tick(&ru, 1)).unwrap();
        assert_eq!(dispatch.listeners.len(), 2);
    }

    #[test]
    fn only_strictly_newer_ticks_are_accepted() {
        let registry = InstrumentRegistry::new();
        let ru = registry.intern_exchange(Exchange::SHFE, "ru1901", None);
        let subscriptions = SubscriptionRegistry::default();
        let listener: Arc<dyn MarketDataListener> = Arc::new(RecordingListener::default());
        subscriptions.add(&listener, &[ru.clone()]);

        assert!(subscriptions.accept(&tick(&ru, 100)).is_some());
        assert!(subscriptions.accept(&tick(&ru, 100)).is_none());
        assert!(subscriptions.accept(&tick(&ru, 99)).is_none());
        assert!(subscriptions.accept(&tick(&ru, 101)).is_some());
        assert_eq!(subscriptions.last_timestamp(&ru), Some(101));
    }

    #[test]
    fn late_claim_loses_to_newer_delivery() {
        let registry = InstrumentRegistry::new();
        let ru = registry.intern_exchange(Exchange::SHFE, "ru1901", None);
        let subscriptions = SubscriptionRegistry::default();
        let listener: Arc<dyn MarketDataListener> = Arc::new(RecordingListener::default());
        subscriptions.add(&listener, &[ru.clone()]);

        let older = subscriptions.accept(&tick(&ru, 5)).unwrap();
        let newer = subscriptions.accept(&tick(&ru, 6)).unwrap();
        assert!(newer.claim(6));
        assert!(!older.claim(5));
    }

    #[test]
    fn unknown_instrument_is_ignored() {
        let registry = InstrumentRegistry::new();
        let ru = registry.intern_exchange(Exchange::SHFE, "ru1901", None);
        let subscriptions = SubscriptionRegistry::default();
        assert!(subscriptions.accept(&tick(&ru, 1)).is_none());
        assert_eq!(subscriptions.last_timestamp(&ru), None);
    }
}
