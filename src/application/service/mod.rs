//! Feed orchestrator.
//!
//! [`MarketDataService`] owns the configured producers, the explicit
//! instrument list and the listener registry. It reconciles producer
//! configs, keeps connections alive through [`MarketDataService::reconcile`],
//! and fans ticks out to listeners on a bounded [`TaskPool`]. Ticks of one
//! instrument always share a pool lane, so listeners see them in order.

mod builder;
mod subscription;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

pub use builder::{ServiceBuilder, ServiceSettings};
pub use subscription::{Dispatch, SubscriptionRegistry};

use crate::domain::{InstrumentId, InstrumentRegistry, ProducerConfig, Tick};
use crate::infrastructure::task_pool::TaskPool;
use crate::port::{
    MarketDataListener, MarketDataProducer, ProducerContext, ProducerFactory, ProducerInfo,
    ProducerSink, ProducerStatus, TickRecorder,
};

/// Separators accepted between entries of an instrument list.
const INSTRUMENT_SEPARATORS: [char; 4] = [',', ';', '\r', '\n'];

type ProducerMap = HashMap<String, Arc<dyn MarketDataProducer>>;

/// Result of [`MarketDataService::reload_producers`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadSummary {
    /// Producers created by this reload, replacements included.
    pub added: usize,
    /// Producers closed by this reload, replaced ones included.
    pub removed: usize,
    /// Producers managed after the reload.
    pub total: usize,
}

impl ReloadSummary {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.removed == 0
    }
}

/// Result of one [`MarketDataService::reconcile`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Producers a connect was started for.
    pub connected: Vec<String>,
    /// Producers closed after staying `Connecting` past the timeout.
    pub timed_out: Vec<String>,
}

/// Handle to the orchestrator. Cheap to clone.
#[derive(Clone)]
pub struct MarketDataService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    registry: Arc<InstrumentRegistry>,
    settings: ServiceSettings,
    factory: Arc<dyn ProducerFactory>,
    recorder: Arc<dyn TickRecorder>,
    context: ProducerContext,
    producers: RwLock<Arc<ProducerMap>>,
    instruments: RwLock<Arc<Vec<InstrumentId>>>,
    listeners: SubscriptionRegistry,
    pool: TaskPool,
    reconcile_in_flight: AtomicBool,
    reload_lock: Mutex<()>,
}

/// Clears the in-flight flag when a reconcile pass ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Producer callbacks routed back into the service.
struct ServiceSink {
    inner: Weak<ServiceInner>,
}

impl ProducerSink for ServiceSink {
    fn on_status_changed(&self, producer_id: &str, previous: ProducerStatus, current: ProducerStatus) {
        if let Some(inner) = self.inner.upgrade() {
            inner.on_status_changed(producer_id, previous, current);
        }
    }

    fn on_tick(&self, tick: Tick) {
        if let Some(inner) = self.inner.upgrade() {
            inner.on_tick(tick);
        }
    }
}

impl MarketDataService {
    pub fn builder(registry: Arc<InstrumentRegistry>) -> ServiceBuilder {
        ServiceBuilder::new(registry)
    }

    fn from_parts(
        registry: Arc<InstrumentRegistry>,
        settings: ServiceSettings,
        factory: Arc<dyn ProducerFactory>,
        recorder: Arc<dyn TickRecorder>,
    ) -> Self {
        let pool = TaskPool::new(settings.worker_count, settings.task_queue_capacity);
        let inner = Arc::new_cyclic(|weak: &Weak<ServiceInner>| ServiceInner {
            context: ProducerContext {
                sink: Arc::new(ServiceSink {
                    inner: weak.clone(),
                }),
                registry: Arc::clone(&registry),
            },
            registry,
            settings,
            factory,
            recorder,
            producers: RwLock::new(Arc::new(HashMap::new())),
            instruments: RwLock::new(Arc::new(Vec::new())),
            listeners: SubscriptionRegistry::default(),
            pool,
            reconcile_in_flight: AtomicBool::new(false),
            reload_lock: Mutex::new(()),
        });
        Self { inner }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<InstrumentRegistry> {
        &self.inner.registry
    }

    #[must_use]
    pub fn settings(&self) -> &ServiceSettings {
        &self.inner.settings
    }

    /// Bring the managed producers in line with `configs`.
    ///
    /// Producers whose config is unchanged are kept as they are. Changed
    /// configs replace the old producer; if the new one cannot be built the
    /// id is dropped. Newly created producers are connected after the new
    /// set is published.
    pub fn reload_producers(&self, configs: &[ProducerConfig]) -> ReloadSummary {
        let inner = &self.inner;
        let _reload = inner.reload_lock.lock();
        let current = Arc::clone(&*inner.producers.read());

        let mut next: ProducerMap = HashMap::with_capacity(configs.len());
        let mut created: Vec<Arc<dyn MarketDataProducer>> = Vec::new();
        for config in configs {
            if next.contains_key(&config.id) {
                warn!(producer = %config.id, "Duplicate producer id, skipping");
                continue;
            }
            if let Some(existing) = current.get(&config.id) {
                if existing.config_equals(config) {
                    next.insert(config.id.clone(), Arc::clone(existing));
                    continue;
                }
            }
            match inner.factory.create(config, &inner.context) {
                Ok(producer) => {
                    created.push(Arc::clone(&producer));
                    next.insert(config.id.clone(), producer);
                }
                Err(e) => {
                    error!(producer = %config.id, kind = %config.kind, error = %e, "Failed to create producer");
                }
            }
        }

        let removed: Vec<Arc<dyn MarketDataProducer>> = current
            .iter()
            .filter(|&(id, old)| next.get(id).map_or(true, |kept| !Arc::ptr_eq(kept, old)))
            .map(|(_, old)| Arc::clone(old))
            .collect();

        let summary = ReloadSummary {
            added: created.len(),
            removed: removed.len(),
            total: next.len(),
        };
        *inner.producers.write() = Arc::new(next);

        for producer in &removed {
            info!(producer = %producer.id(), "Closing producer");
            producer.close();
        }
        for producer in &created {
            info!(producer = %producer.id(), kind = %producer.producer_type(), "Connecting producer");
            producer.connect();
        }

        if summary.is_noop() {
            debug!(total = summary.total, "Producer reload: no changes");
        } else {
            info!(
                added = summary.added,
                removed = summary.removed,
                total = summary.total,
                "Producers reloaded"
            );
        }
        summary
    }

    /// Replace the explicit instrument list with the ids in `text`.
    ///
    /// Entries are separated by `,`, `;` or line breaks. Invalid entries are
    /// logged and skipped. Returns the ids that were not in the previous
    /// list.
    pub fn reload_instrument_ids(&self, text: &str) -> Vec<InstrumentId> {
        let mut seen = HashSet::new();
        let mut parsed = Vec::new();
        for entry in text.split(INSTRUMENT_SEPARATORS) {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            match self.inner.registry.parse(entry) {
                Ok(id) => {
                    if seen.insert(id.clone()) {
                        parsed.push(id);
                    }
                }
                Err(e) => warn!(entry, error = %e, "Skipping invalid instrument id"),
            }
        }

        let previous = {
            let mut instruments = self.inner.instruments.write();
            std::mem::replace(&mut *instruments, Arc::new(parsed.clone()))
        };
        let previous: HashSet<&InstrumentId> = previous.iter().collect();
        let added: Vec<InstrumentId> = parsed
            .into_iter()
            .filter(|id| !previous.contains(id))
            .collect();
        if !added.is_empty() {
            info!(added = added.len(), "Instrument list reloaded");
        }
        added
    }

    /// [`reload_instrument_ids`](Self::reload_instrument_ids), then request
    /// the new ids from every connected producer.
    pub fn reload_instrument_ids_and_subscribe(&self, text: &str) -> Vec<InstrumentId> {
        let added = self.reload_instrument_ids(text);
        self.inner.subscribe_connected(&added);
        added
    }

    /// One maintenance pass over the producers.
    ///
    /// Returns `None` when another pass is still running.
    pub fn reconcile(&self) -> Option<ReconcileOutcome> {
        let inner = &self.inner;
        if inner
            .reconcile_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Reconcile already running, skipping");
            return None;
        }
        let _guard = InFlight(&inner.reconcile_in_flight);

        let mut outcome = ReconcileOutcome::default();
        for producer in inner.sorted_producers() {
            match producer.status() {
                ProducerStatus::Disconnected => {
                    debug!(producer = %producer.id(), "Reconnecting producer");
                    producer.connect();
                    outcome.connected.push(producer.id().to_string());
                }
                ProducerStatus::Connecting => {
                    let elapsed = (Utc::now() - producer.status_changed_at())
                        .to_std()
                        .unwrap_or(Duration::ZERO);
                    if elapsed > inner.settings.connection_timeout {
                        warn!(
                            producer = %producer.id(),
                            elapsed_ms = elapsed.as_millis() as u64,
                            "Connect timed out, closing"
                        );
                        producer.close();
                        outcome.timed_out.push(producer.id().to_string());
                    }
                }
                ProducerStatus::Connected | ProducerStatus::ConnectFailed => {}
            }
        }
        Some(outcome)
    }

    /// Register `listener` for `instruments`. Instruments nobody listened to
    /// before are requested from connected producers and returned.
    pub fn add_listener(
        &self,
        listener: Arc<dyn MarketDataListener>,
        instruments: &[InstrumentId],
    ) -> Vec<InstrumentId> {
        let added = self.inner.listeners.add(&listener, instruments);
        self.inner.subscribe_connected(&added);
        added
    }

    /// Every instrument that should be requested from producers: the
    /// explicit list plus everything listeners asked for. Sorted.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<InstrumentId> {
        self.inner.subscriptions()
    }

    #[must_use]
    pub fn instrument_ids(&self) -> Vec<InstrumentId> {
        self.inner.instruments.read().as_ref().clone()
    }

    /// Snapshot of every producer, sorted by id.
    #[must_use]
    pub fn producers(&self) -> Vec<ProducerInfo> {
        self.inner
            .sorted_producers()
            .iter()
            .map(|p| p.info())
            .collect()
    }

    #[must_use]
    pub fn producer(&self, id: &str) -> Option<Arc<dyn MarketDataProducer>> {
        self.inner.producers.read().get(id).cloned()
    }

    /// Last timestamp dispatched to listeners for `instrument`.
    #[must_use]
    pub fn last_dispatched(&self, instrument: &InstrumentId) -> Option<i64> {
        self.inner.listeners.last_timestamp(instrument)
    }

    /// Jobs the worker pool dropped because its queue was full.
    #[must_use]
    pub fn rejected_tasks(&self) -> u64 {
        self.inner.pool.rejected()
    }

    #[must_use]
    pub fn panicked_tasks(&self) -> u64 {
        self.inner.pool.panicked()
    }

    /// Close every producer and stop the workers.
    pub fn shutdown(&self) {
        let producers = {
            let mut producers = self.inner.producers.write();
            std::mem::replace(&mut *producers, Arc::new(HashMap::new()))
        };
        for producer in producers.values() {
            producer.close();
        }
        self.inner.pool.shutdown();
        info!(closed = producers.len(), "Market data service stopped");
    }
}

impl ServiceInner {
    fn sorted_producers(&self) -> Vec<Arc<dyn MarketDataProducer>> {
        let snapshot = Arc::clone(&*self.producers.read());
        let mut producers: Vec<_> = snapshot.values().cloned().collect();
        producers.sort_by(|a, b| a.id().cmp(b.id()));
        producers
    }

    fn subscriptions(&self) -> Vec<InstrumentId> {
        let mut all: BTreeSet<InstrumentId> = self.listeners.instruments().into_iter().collect();
        all.extend(self.instruments.read().iter().cloned());
        all.into_iter().collect()
    }

    fn subscribe_connected(&self, instruments: &[InstrumentId]) {
        if instruments.is_empty() {
            return;
        }
        for producer in self.sorted_producers() {
            if producer.status() == ProducerStatus::Connected {
                self.push_subscriptions(producer, instruments);
            }
        }
    }

    /// Queue a subscribe call for the instruments `producer` can serve.
    fn push_subscriptions(&self, producer: Arc<dyn MarketDataProducer>, instruments: &[InstrumentId]) {
        let wanted: Vec<InstrumentId> = instruments
            .iter()
            .filter(|i| producer.can_subscribe(i))
            .cloned()
            .collect();
        if wanted.is_empty() {
            return;
        }
        let id = producer.id().to_string();
        let count = wanted.len();
        let queued = self.pool.execute("subscribe", async move {
            if let Err(e) = producer.subscribe(&wanted).await {
                warn!(producer = %producer.id(), error = %e, "Subscribe failed");
            }
        });
        if queued {
            debug!(producer = %id, instruments = count, "Subscribe queued");
        }
    }

    fn on_status_changed(&self, producer_id: &str, previous: ProducerStatus, current: ProducerStatus) {
        debug!(producer = producer_id, from = %previous, to = %current, "Producer status observed");
        if current != ProducerStatus::Connected {
            return;
        }
        let Some(producer) = self.producers.read().get(producer_id).cloned() else {
            return;
        };
        self.push_subscriptions(producer, &self.subscriptions());
    }

    fn on_tick(&self, tick: Tick) {
        self.recorder.record(&tick);
        let Some(dispatch) = self.listeners.accept(&tick) else {
            return;
        };
        // one lane per instrument keeps its ticks in order
        let lane = u64::from(tick.instrument.int_id());
        self.pool.execute_keyed(lane, "dispatch", async move {
            if !dispatch.claim(tick.timestamp) {
                debug!(
                    instrument = %tick.instrument,
                    timestamp = tick.timestamp,
                    "Newer tick already delivered, dropping"
                );
                return;
            }
            for listener in dispatch.listeners {
                let delivered =
                    std::panic::catch_unwind(AssertUnwindSafe(|| listener.on_market_data(&tick)));
                if delivered.is_err() {
                    error!(
                        instrument = %tick.instrument,
                        producer = %tick.producer_id,
                        "Listener panicked"
                    );
                }
            }
        });
    }
}
