//! Application configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all settings.
//!
//! # Example
//!
//! ```no_run
//! use tickwarden::infrastructure::config::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::calendar::CalendarConfig;
use super::logging::LoggingConfig;
use super::market_data::MarketDataConfig;
use crate::domain::InstrumentSpec;
use crate::error::{ConfigError, Result};

/// Main application configuration.
///
/// Load from a TOML file using [`Config::load`] or parse directly with
/// [`Config::parse_toml`]. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Logging and tracing configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Producers, subscribed instruments and orchestration tuning.
    #[serde(default)]
    pub market_data: MarketDataConfig,

    /// Exchange holidays.
    #[serde(default)]
    pub calendar: CalendarConfig,

    /// Instrument master list, interned before any runtime lookup.
    #[serde(default)]
    pub instruments: Vec<InstrumentSpec>,

    /// Path to the status file for external monitoring.
    ///
    /// Set to enable status file writing (e.g. "/var/run/tickwarden/status.json").
    #[serde(default)]
    pub status_file: Option<PathBuf>,
}

impl Config {
    /// Parse configuration from TOML content.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML content is malformed or validation fails.
    #[allow(clippy::result_large_err)]
    pub fn parse_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    #[allow(clippy::result_large_err)]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    #[allow(clippy::result_large_err)]
    fn validate(&self) -> Result<()> {
        let market_data = &self.market_data;
        if market_data.connection_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "connection_timeout_secs",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if market_data.maintenance_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "maintenance_interval_secs",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if market_data.worker_count == 0 {
            return Err(ConfigError::InvalidValue {
                field: "worker_count",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if market_data.task_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "task_queue_capacity",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        for producer in &market_data.producers {
            if producer.id.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    field: "market_data.producer.id",
                }
                .into());
            }
            if producer.kind.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    field: "market_data.producer.type",
                }
                .into());
            }
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::InvalidValue {
                field: "logging.format",
                reason: format!("expected 'pretty' or 'json', got '{}'", self.logging.format),
            }
            .into());
        }
        self.calendar.exchange_holidays()?;
        Ok(())
    }

    /// Initialize logging with the configured settings.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}
