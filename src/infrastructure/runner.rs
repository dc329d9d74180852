//! Periodic maintenance loop.
//!
//! Each pass reloads the config file if it changed, re-applies the last
//! good producer list so failed constructions get another try, reconciles
//! producer connections and refreshes the status file.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::config::Config;
use super::status_file::StatusWriter;
use super::watcher::ConfigWatcher;
use crate::application::service::{MarketDataService, ReconcileOutcome, ReloadSummary};
use crate::domain::ProducerConfig;

/// Push a loaded config into the service: intern the instrument master
/// list, reload the explicit instrument list and the producers.
pub fn apply_config(service: &MarketDataService, config: &Config) {
    let seeded = service.registry().preload(config.instruments.iter().cloned());
    debug!(instruments = seeded.len(), "Instrument master list loaded");
    let added = service.reload_instrument_ids_and_subscribe(&config.market_data.instrument_ids);
    debug!(added = added.len(), "Instrument ids applied");
    service.reload_producers(&config.market_data.producers);
}

/// What one maintenance pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub config_reloaded: bool,
    /// Reload of the last good producer list; `None` when the config was
    /// just applied or no config has been loaded yet.
    pub producers: Option<ReloadSummary>,
    /// `None` when reconcile was skipped.
    pub reconcile: Option<ReconcileOutcome>,
    pub status_written: bool,
}

pub struct MaintenanceRunner {
    service: MarketDataService,
    interval: Duration,
    watcher: Option<ConfigWatcher>,
    status: Option<StatusWriter>,
    producer_configs: Option<Vec<ProducerConfig>>,
}

impl MaintenanceRunner {
    #[must_use]
    pub fn new(service: MarketDataService, interval: Duration) -> Self {
        Self {
            service,
            interval,
            watcher: None,
            status: None,
            producer_configs: None,
        }
    }

    /// Reload `path` whenever its modification time changes.
    #[must_use]
    pub fn watch_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.watcher = Some(ConfigWatcher::new(path));
        self
    }

    #[must_use]
    pub fn status_file(mut self, path: PathBuf) -> Self {
        self.status = Some(StatusWriter::new(path));
        self
    }

    /// Run one pass. Failures are logged; the pass always completes.
    pub fn run_pass(&mut self) -> PassReport {
        let mut report = PassReport::default();

        if let Some(watcher) = self.watcher.as_mut() {
            if watcher.poll_changed() {
                match Config::load(watcher.path()) {
                    Ok(config) => {
                        info!(path = %watcher.path().display(), "Config changed, reloading");
                        apply_config(&self.service, &config);
                        self.producer_configs = Some(config.market_data.producers);
                        report.config_reloaded = true;
                    }
                    Err(e) => {
                        warn!(
                            path = %watcher.path().display(),
                            error = %e,
                            "Config reload failed, keeping previous settings"
                        );
                    }
                }
            }
        }

        if !report.config_reloaded {
            if let Some(configs) = &self.producer_configs {
                report.producers = Some(self.service.reload_producers(configs));
            }
        }

        report.reconcile = self.service.reconcile();

        if let Some(status) = &self.status {
            match status.write(&self.service) {
                Ok(()) => report.status_written = true,
                Err(e) => {
                    warn!(path = %status.path().display(), error = %e, "Failed to write status file");
                }
            }
        }
        report
    }

    /// Run passes on the configured interval until `shutdown` becomes true.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = self.interval.as_secs(), "Maintenance runner started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_pass();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Maintenance runner stopped");
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
