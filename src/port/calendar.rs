//! Calendar ports: which days a venue trades, and when.

use chrono::{Duration, NaiveDate};

use crate::domain::{Exchange, MarketType, SessionWindow};

/// Upper bound on the number of days scanned when looking for the
/// neighbouring market day. Longer closures are treated as "none".
pub const MAX_CALENDAR_SCAN_DAYS: i64 = 366;

/// Answers whether a venue trades on a given date.
pub trait MarketDayOracle: Send + Sync {
    fn is_market_day(&self, exchange: Exchange, day: NaiveDate) -> bool;

    /// First market day strictly after `day`.
    fn next_market_day(&self, exchange: Exchange, day: NaiveDate) -> Option<NaiveDate> {
        (1..=MAX_CALENDAR_SCAN_DAYS)
            .map(|offset| day + Duration::days(offset))
            .find(|candidate| self.is_market_day(exchange, *candidate))
    }

    /// Last market day strictly before `day`.
    fn prev_market_day(&self, exchange: Exchange, day: NaiveDate) -> Option<NaiveDate> {
        (1..=MAX_CALENDAR_SCAN_DAYS)
            .map(|offset| day - Duration::days(offset))
            .find(|candidate| self.is_market_day(exchange, *candidate))
    }
}

/// Supplies session templates per venue and product.
pub trait SessionTable: Send + Sync {
    /// Session window of `market_type` for `commodity` on `trading_day`.
    ///
    /// Night windows start on the evening before `trading_day`. Returns
    /// `None` when the product has no such session.
    fn session_window(
        &self,
        exchange: Exchange,
        market_type: MarketType,
        commodity: &str,
        trading_day: NaiveDate,
    ) -> Option<SessionWindow>;
}
