//! Weekend and holiday based market-day oracle.

use std::collections::{BTreeSet, HashMap};

use chrono::{Datelike, NaiveDate, Weekday};

use crate::domain::Exchange;
use crate::error::ConfigError;
use crate::infrastructure::config::CalendarConfig;
use crate::port::MarketDayOracle;

/// Market-day calendar: weekends are closed, as are configured holidays.
///
/// Holidays come from a list shared by every venue plus optional
/// per-venue lists.
#[derive(Debug, Clone, Default)]
pub struct HolidayCalendar {
    shared: BTreeSet<NaiveDate>,
    by_exchange: HashMap<Exchange, BTreeSet<NaiveDate>>,
}

impl HolidayCalendar {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the `[calendar]` config section.
    pub fn from_config(config: &CalendarConfig) -> Result<Self, ConfigError> {
        let mut calendar = Self::new().with_holidays(config.holidays.iter().copied());
        for (exchange, days) in config.exchange_holidays()? {
            calendar = calendar.with_exchange_holidays(exchange, days);
        }
        Ok(calendar)
    }

    /// Holidays observed by every venue.
    #[must_use]
    pub fn with_holidays<I>(mut self, days: I) -> Self
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        self.shared.extend(days);
        self
    }

    #[must_use]
    pub fn with_exchange_holidays<I>(mut self, exchange: Exchange, days: I) -> Self
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        self.by_exchange.entry(exchange).or_default().extend(days);
        self
    }

    /// Whether `day` is a configured holiday for `exchange`, weekends excluded.
    #[must_use]
    pub fn is_holiday(&self, exchange: Exchange, day: NaiveDate) -> bool {
        self.shared.contains(&day)
            || self
                .by_exchange
                .get(&exchange)
                .is_some_and(|days| days.contains(&day))
    }
}

impl MarketDayOracle for HolidayCalendar {
    fn is_market_day(&self, exchange: Exchange, day: NaiveDate) -> bool {
        if matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        !self.is_holiday(exchange, day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn weekends_are_closed() {
        let calendar = HolidayCalendar::new();
        assert!(calendar.is_market_day(Exchange::SSE, date(2018, 10, 26)));
        assert!(!calendar.is_market_day(Exchange::SSE, date(2018, 10, 27)));
        assert!(!calendar.is_market_day(Exchange::SSE, date(2018, 10, 28)));
    }

    #[test]
    fn shared_and_venue_holidays() {
        let calendar = HolidayCalendar::new()
            .with_holidays([date(2018, 10, 1)])
            .with_exchange_holidays(Exchange::HKEX, [date(2018, 10, 17)]);
        assert!(!calendar.is_market_day(Exchange::SHFE, date(2018, 10, 1)));
        assert!(!calendar.is_market_day(Exchange::HKEX, date(2018, 10, 17)));
        assert!(calendar.is_market_day(Exchange::SSE, date(2018, 10, 17)));
    }

    #[test]
    fn neighbouring_market_days_skip_closures() {
        let calendar = HolidayCalendar::new().with_holidays([date(2018, 10, 29)]);
        // Friday -> Tuesday over a weekend and a Monday holiday
        assert_eq!(
            calendar.next_market_day(Exchange::SHFE, date(2018, 10, 26)),
            Some(date(2018, 10, 30))
        );
        assert_eq!(
            calendar.prev_market_day(Exchange::SHFE, date(2018, 10, 30)),
            Some(date(2018, 10, 26))
        );
    }
}
