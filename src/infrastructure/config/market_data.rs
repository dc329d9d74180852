//! Feed orchestration settings.

use std::time::Duration;

use serde::Deserialize;

use crate::domain::ProducerConfig;

/// The `[market_data]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketDataConfig {
    /// Explicitly subscribed instruments, separated by `,`, `;` or newlines.
    #[serde(default)]
    pub instrument_ids: String,
    /// Seconds a producer may stay `Connecting` before it is closed.
    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,
    /// Period of the maintenance pass.
    #[serde(default = "default_maintenance_interval_secs")]
    pub maintenance_interval_secs: u64,
    /// Workers executing subscribe calls and listener dispatch.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Jobs queued beyond this are rejected.
    #[serde(default = "default_task_queue_capacity")]
    pub task_queue_capacity: usize,
    #[serde(default, rename = "producer")]
    pub producers: Vec<ProducerConfig>,
}

const fn default_connection_timeout_secs() -> u64 {
    15
}

const fn default_maintenance_interval_secs() -> u64 {
    15
}

const fn default_worker_count() -> usize {
    4
}

const fn default_task_queue_capacity() -> usize {
    4096
}

impl MarketDataConfig {
    #[must_use]
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    #[must_use]
    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs)
    }
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            instrument_ids: String::new(),
            connection_timeout_secs: default_connection_timeout_secs(),
            maintenance_interval_secs: default_maintenance_interval_secs(),
            worker_count: default_worker_count(),
            task_queue_capacity: default_task_queue_capacity(),
            producers: Vec::new(),
        }
    }
}
