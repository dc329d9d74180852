//! Trading-day resolution and intraday stage classification.
//!
//! [`TradingCalendar`] combines a [`MarketDayOracle`] with a
//! [`SessionTable`]. Night sessions are attributed to the next market day,
//! so an instant on Thursday evening belongs to Friday's trading day.

mod holiday;
mod session_table;

use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};

pub use holiday::HolidayCalendar;
pub use session_table::StaticSessionTable;

use crate::domain::{InstrumentId, MarketTimeStage, MarketType, SessionWindow, TradingMarketInfo};
use crate::error::{CalendarError, ConfigError};
use crate::infrastructure::config::CalendarConfig;
use crate::port::{MarketDayOracle, SessionTable};

/// Hours around a session during which instants still resolve to it.
const SESSION_MARGIN_HOURS: i64 = 1;

/// Instants up to this hour (inclusive) may belong to a night session that
/// began the previous evening.
const NIGHT_CARRY_LAST_HOUR: u32 = 3;

#[derive(Clone)]
pub struct TradingCalendar {
    days: Arc<dyn MarketDayOracle>,
    sessions: Arc<dyn SessionTable>,
}

impl TradingCalendar {
    pub fn new(days: Arc<dyn MarketDayOracle>, sessions: Arc<dyn SessionTable>) -> Self {
        Self { days, sessions }
    }

    /// Holiday calendar from config plus the built-in session templates.
    pub fn builtin(config: &CalendarConfig) -> Result<Self, ConfigError> {
        let days: Arc<dyn MarketDayOracle> = Arc::new(HolidayCalendar::from_config(config)?);
        let sessions = Arc::new(StaticSessionTable::new(days.clone()));
        Ok(Self::new(days, sessions))
    }

    #[must_use]
    pub fn market_days(&self) -> &Arc<dyn MarketDayOracle> {
        &self.days
    }

    /// Session window for an instrument's product on `trading_day`.
    #[must_use]
    pub fn session_window(
        &self,
        instrument: &InstrumentId,
        market_type: MarketType,
        trading_day: NaiveDate,
    ) -> Option<SessionWindow> {
        self.sessions.session_window(
            instrument.exchange(),
            market_type,
            instrument.commodity(),
            trading_day,
        )
    }

    /// Determine the trading day and session `instant` belongs to.
    ///
    /// Returns `None` when the instant is more than an hour away from any
    /// session of the instrument.
    #[must_use]
    pub fn resolve_trading_context(
        &self,
        instrument: &InstrumentId,
        instant: NaiveDateTime,
    ) -> Option<TradingMarketInfo> {
        let exchange = instrument.exchange();
        let margin = Duration::hours(SESSION_MARGIN_HOURS);
        let day = instant.date();
        let day_window = self.session_window(instrument, MarketType::Day, day)?;

        if self.days.is_market_day(exchange, day) && day_window.contains_with_margin(instant, margin)
        {
            return Some(TradingMarketInfo {
                trading_day: day,
                market_type: MarketType::Day,
                window: day_window,
            });
        }
        if !exchange.has_night_market() {
            return None;
        }

        let hour = instant.hour();
        let candidate = if hour <= NIGHT_CARRY_LAST_HOUR {
            self.days.next_market_day(exchange, day - Duration::days(1))?
        } else if hour >= day_window.close().hour() {
            self.days.next_market_day(exchange, day)?
        } else {
            return None;
        };

        let night_window = self.session_window(instrument, MarketType::Night, candidate)?;
        if !night_window.first().contains_with_margin(instant, margin) {
            return None;
        }
        Some(TradingMarketInfo {
            trading_day: candidate,
            market_type: MarketType::Night,
            window: night_window,
        })
    }

    #[must_use]
    pub fn trading_day(&self, instrument: &InstrumentId, instant: NaiveDateTime) -> Option<NaiveDate> {
        self.resolve_trading_context(instrument, instant)
            .map(|info| info.trading_day)
    }

    /// Stage of `instant` within the given session.
    ///
    /// `Ok(None)` when the product has no such session. An error means the
    /// session table is inconsistent and must not be papered over.
    pub fn classify_stage(
        &self,
        instrument: &InstrumentId,
        market_type: MarketType,
        trading_day: NaiveDate,
        instant: NaiveDateTime,
    ) -> Result<Option<MarketTimeStage>, CalendarError> {
        match self.session_window(instrument, market_type, trading_day) {
            Some(window) => window.stage_at(instant).map(Some),
            None => Ok(None),
        }
    }

    /// Resolve the trading context of `instant`, then classify it.
    pub fn time_stage(
        &self,
        instrument: &InstrumentId,
        instant: NaiveDateTime,
    ) -> Result<Option<MarketTimeStage>, CalendarError> {
        match self.resolve_trading_context(instrument, instant) {
            Some(info) => info.window.stage_at(instant).map(Some),
            None => Ok(None),
        }
    }

    /// Milliseconds of trading elapsed in the session up to `instant`.
    #[must_use]
    pub fn trading_millis(
        &self,
        instrument: &InstrumentId,
        market_type: MarketType,
        trading_day: NaiveDate,
        instant: NaiveDateTime,
    ) -> Option<i64> {
        self.session_window(instrument, market_type, trading_day)
            .map(|window| window.trading_millis(instant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Exchange, InstrumentRegistry};
    use chrono::NaiveTime;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(h, min, 0).unwrap())
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn calendar() -> TradingCalendar {
        TradingCalendar::builtin(&CalendarConfig::default()).unwrap()
    }

    #[test]
    fn day_session_resolves_to_same_day() {
        let registry = InstrumentRegistry::new();
        let ru = registry.intern_exchange(Exchange::SHFE, "ru1901", None);
        let calendar = calendar();

        let info = calendar
            .resolve_trading_context(&ru, at(2018, 10, 25, 9, 0))
            .unwrap();
        assert_eq!(info.trading_day, date(2018, 10, 25));
        assert_eq!(info.market_type, MarketType::Day);
        assert_eq!(
            calendar.time_stage(&ru, at(2018, 10, 25, 9, 0)).unwrap(),
            Some(MarketTimeStage::Open)
        );
    }

    #[test]
    fn evening_session_belongs_to_next_trading_day() {
        let registry = InstrumentRegistry::new();
        let ru = registry.intern_exchange(Exchange::SHFE, "ru1901", None);
        let calendar = calendar();

        let info = calendar
            .resolve_trading_context(&ru, at(2018, 10, 25, 21, 0))
            .unwrap();
        assert_eq!(info.trading_day, date(2018, 10, 26));
        assert_eq!(info.market_type, MarketType::Night);
        assert_eq!(
            calendar
                .classify_stage(&ru, MarketType::Night, date(2018, 10, 26), at(2018, 10, 25, 21, 0))
                .unwrap(),
            Some(MarketTimeStage::Open)
        );
    }

    #[test]
    fn after_midnight_on_saturday_belongs_to_monday() {
        let registry = InstrumentRegistry::new();
        let au = registry.intern_exchange(Exchange::SHFE, "au1812", None);
        let calendar = calendar();

        let info = calendar
            .resolve_trading_context(&au, at(2018, 10, 27, 1, 30))
            .unwrap();
        assert_eq!(info.trading_day, date(2018, 10, 29));
        assert_eq!(info.market_type, MarketType::Night);
    }

    #[test]
    fn no_context_far_from_sessions() {
        let registry = InstrumentRegistry::new();
        let stock = registry.intern_exchange(Exchange::SSE, "600000", None);
        let ru = registry.intern_exchange(Exchange::SHFE, "ru1901", None);
        let calendar = calendar();

        assert!(calendar
            .resolve_trading_context(&stock, at(2018, 10, 25, 20, 0))
            .is_none());
        assert!(calendar
            .resolve_trading_context(&stock, at(2018, 10, 27, 10, 0))
            .is_none());
        assert!(calendar
            .resolve_trading_context(&ru, at(2018, 10, 25, 5, 0))
            .is_none());
        assert_eq!(calendar.time_stage(&stock, at(2018, 10, 25, 20, 0)), Ok(None));
    }

    #[test]
    fn margin_boundaries_are_inclusive() {
        let registry = InstrumentRegistry::new();
        let stock = registry.intern_exchange(Exchange::SSE, "600000", None);
        let calendar = calendar();

        assert!(calendar
            .resolve_trading_context(&stock, at(2018, 10, 25, 8, 30))
            .is_some());
        assert!(calendar
            .resolve_trading_context(&stock, at(2018, 10, 25, 16, 0))
            .is_some());
        assert_eq!(
            calendar.time_stage(&stock, at(2018, 10, 25, 9, 25)).unwrap(),
            Some(MarketTimeStage::AggregateAuction)
        );
    }

    #[test]
    fn classify_without_session_is_none() {
        let registry = InstrumentRegistry::new();
        let stock = registry.intern_exchange(Exchange::SSE, "600000", None);
        let calendar = calendar();

        assert_eq!(
            calendar.classify_stage(
                &stock,
                MarketType::Night,
                date(2018, 10, 25),
                at(2018, 10, 25, 21, 0)
            ),
            Ok(None)
        );
    }

    #[test]
    fn trading_millis_for_stock_lunch_break() {
        let registry = InstrumentRegistry::new();
        let stock = registry.intern_exchange(Exchange::SSE, "600000", None);
        let calendar = calendar();

        let millis = calendar
            .trading_millis(&stock, MarketType::Day, date(2018, 10, 25), at(2018, 10, 25, 13, 30))
            .unwrap();
        assert_eq!(millis, (120 + 30) * 60_000);
    }
}
