//! Exchange holiday settings.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::domain::Exchange;
use crate::error::ConfigError;

/// The `[calendar]` section. Dates are quoted `YYYY-MM-DD` strings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CalendarConfig {
    /// Closed on every venue.
    #[serde(default)]
    pub holidays: Vec<NaiveDate>,
    /// Extra closures keyed by venue name.
    #[serde(default)]
    pub exchange_holidays: HashMap<String, Vec<NaiveDate>>,
}

impl CalendarConfig {
    /// Per-venue holidays with venue names resolved.
    pub fn exchange_holidays(&self) -> Result<Vec<(Exchange, Vec<NaiveDate>)>, ConfigError> {
        self.exchange_holidays
            .iter()
            .map(|(name, days)| {
                let exchange =
                    Exchange::from_name(name).ok_or_else(|| ConfigError::InvalidValue {
                        field: "calendar.exchange_holidays",
                        reason: format!("unknown exchange '{name}'"),
                    })?;
                Ok((exchange, days.clone()))
            })
            .collect()
    }
}
