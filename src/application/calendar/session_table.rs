//! Built-in session templates for the supported venues.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime};

use crate::domain::{Exchange, MarketType, SessionSegment, SessionWindow};
use crate::port::{MarketDayOracle, SessionTable};

type Hm = (u32, u32);

const STOCK_DAY: &[(Hm, Hm)] = &[((9, 30), (11, 30)), ((13, 0), (15, 0))];
const HKEX_DAY: &[(Hm, Hm)] = &[((9, 30), (12, 0)), ((13, 0), (16, 0))];
const INDEX_FUTURES_DAY: &[(Hm, Hm)] = &[((9, 30), (11, 30)), ((13, 0), (15, 0))];
const TREASURY_FUTURES_DAY: &[(Hm, Hm)] = &[((9, 15), (11, 30)), ((13, 0), (15, 15))];
const COMMODITY_DAY: &[(Hm, Hm)] = &[((9, 0), (10, 15)), ((10, 30), (11, 30)), ((13, 30), (15, 0))];

const TREASURY_FUTURES: &[&str] = &["T", "TF", "TS", "TL"];

const NIGHT_OPEN: Hm = (21, 0);

/// Night session close, by product. Products not listed have no night session.
const NIGHT_CLOSES: &[(Hm, &[&str])] = &[
    ((2, 30), &["au", "ag", "sc"]),
    ((1, 0), &["cu", "al", "zn", "pb", "ni", "sn", "ss", "bc", "ao"]),
    (
        (23, 0),
        &[
            // SHFE / INE
            "rb", "hc", "fu", "bu", "ru", "sp", "br", "lu", "nr",
            // DCE
            "a", "b", "m", "y", "p", "c", "cs", "l", "v", "pp", "j", "jm", "i", "eg", "eb", "pg",
            "rr",
            // CZCE
            "SR", "CF", "CY", "TA", "MA", "FG", "RM", "OI", "ZC", "SA", "PF", "PX", "SH",
        ],
    ),
];

/// Fixed session templates per venue and product.
///
/// Night sessions open at 21:00 on the market day preceding the trading
/// day, so the table consults a [`MarketDayOracle`] to place them.
pub struct StaticSessionTable {
    days: Arc<dyn MarketDayOracle>,
}

impl StaticSessionTable {
    pub fn new(days: Arc<dyn MarketDayOracle>) -> Self {
        Self { days }
    }

    fn day_template(exchange: Exchange, commodity: &str) -> &'static [(Hm, Hm)] {
        match exchange {
            Exchange::SSE | Exchange::SZSE => STOCK_DAY,
            Exchange::HKEX => HKEX_DAY,
            Exchange::CFFEX if TREASURY_FUTURES.contains(&commodity) => TREASURY_FUTURES_DAY,
            Exchange::CFFEX => INDEX_FUTURES_DAY,
            Exchange::SHFE | Exchange::DCE | Exchange::CZCE | Exchange::INE => COMMODITY_DAY,
        }
    }

    fn night_close(commodity: &str) -> Option<Hm> {
        NIGHT_CLOSES
            .iter()
            .find(|(_, products)| products.iter().any(|p| p.eq_ignore_ascii_case(commodity)))
            .map(|(close, _)| *close)
    }

    fn day_window(exchange: Exchange, commodity: &str, day: NaiveDate) -> Option<SessionWindow> {
        let segments = Self::day_template(exchange, commodity)
            .iter()
            .map(|(open, close)| Some(SessionSegment::new(at(day, *open)?, at(day, *close)?)))
            .collect::<Option<Vec<_>>>()?;
        SessionWindow::new(segments).ok()
    }

    fn night_window(
        &self,
        exchange: Exchange,
        commodity: &str,
        trading_day: NaiveDate,
    ) -> Option<SessionWindow> {
        if !exchange.has_night_market() {
            return None;
        }
        let close = Self::night_close(commodity)?;
        let evening = self.days.prev_market_day(exchange, trading_day)?;
        let open = at(evening, NIGHT_OPEN)?;
        let close_day = if close < NIGHT_OPEN {
            evening + Duration::days(1)
        } else {
            evening
        };
        let close = at(close_day, close)?;
        SessionWindow::new(vec![SessionSegment::new(open, close)]).ok()
    }
}

impl SessionTable for StaticSessionTable {
    fn session_window(
        &self,
        exchange: Exchange,
        market_type: MarketType,
        commodity: &str,
        trading_day: NaiveDate,
    ) -> Option<SessionWindow> {
        match market_type {
            MarketType::Day => Self::day_window(exchange, commodity, trading_day),
            MarketType::Night => self.night_window(exchange, commodity, trading_day),
        }
    }
}

fn at(day: NaiveDate, (hour, minute): Hm) -> Option<chrono::NaiveDateTime> {
    NaiveTime::from_hms_opt(hour, minute, 0).map(|time| day.and_time(time))
}
