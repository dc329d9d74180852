//! Service construction.

use std::sync::Arc;
use std::time::Duration;

use crate::adapter::producer::BuiltinProducerFactory;
use crate::domain::InstrumentRegistry;
use crate::infrastructure::config::MarketDataConfig;
use crate::port::{NullRecorder, ProducerFactory, TickRecorder};

use super::MarketDataService;

/// Runtime knobs of a [`MarketDataService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    /// How long a producer may stay `Connecting` before reconcile closes it.
    pub connection_timeout: Duration,
    pub worker_count: usize,
    pub task_queue_capacity: usize,
}

impl ServiceSettings {
    #[must_use]
    pub fn from_config(config: &MarketDataConfig) -> Self {
        Self {
            connection_timeout: config.connection_timeout(),
            worker_count: config.worker_count,
            task_queue_capacity: config.task_queue_capacity,
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::from_config(&MarketDataConfig::default())
    }
}

/// Builder for [`MarketDataService`].
///
/// Defaults to the built-in producer bindings and a recorder that discards
/// every tick.
pub struct ServiceBuilder {
    registry: Arc<InstrumentRegistry>,
    settings: ServiceSettings,
    factory: Arc<dyn ProducerFactory>,
    recorder: Arc<dyn TickRecorder>,
}

impl ServiceBuilder {
    pub(super) fn new(registry: Arc<InstrumentRegistry>) -> Self {
        Self {
            registry,
            settings: ServiceSettings::default(),
            factory: Arc::new(BuiltinProducerFactory),
            recorder: Arc::new(NullRecorder),
        }
    }

    #[must_use]
    pub fn settings(mut self, settings: ServiceSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn factory(mut self, factory: Arc<dyn ProducerFactory>) -> Self {
        self.factory = factory;
        self
    }

    #[must_use]
    pub fn recorder(mut self, recorder: Arc<dyn TickRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    /// Build the service. Spawns the worker pool, so this must run inside a
    /// Tokio runtime.
    #[must_use]
    pub fn build(self) -> MarketDataService {
        MarketDataService::from_parts(self.registry, self.settings, self.factory, self.recorder)
    }
}
