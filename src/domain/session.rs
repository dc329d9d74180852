//! Trading session windows and intraday stages.

use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

use super::exchange::MarketType;
use crate::error::CalendarError;

/// Minutes the opening call auction starts before the first segment opens.
pub const AUCTION_LEAD_MINUTES: i64 = 5;

/// One continuous trading segment, exchange-local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionSegment {
    pub open: NaiveDateTime,
    pub close: NaiveDateTime,
}

impl SessionSegment {
    #[must_use]
    pub fn new(open: NaiveDateTime, close: NaiveDateTime) -> Self {
        Self { open, close }
    }

    /// Inclusive on both ends.
    #[must_use]
    pub fn contains(&self, instant: NaiveDateTime) -> bool {
        self.open <= instant && instant <= self.close
    }

    #[must_use]
    pub fn contains_with_margin(&self, instant: NaiveDateTime, margin: Duration) -> bool {
        self.open - margin <= instant && instant <= self.close + margin
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.close - self.open
    }
}

/// Ordered, non-overlapping trading segments of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SessionWindow {
    segments: Vec<SessionSegment>,
}

impl SessionWindow {
    pub fn new(segments: Vec<SessionSegment>) -> Result<Self, CalendarError> {
        if segments.is_empty() {
            return Err(CalendarError::MalformedWindow("no segments".into()));
        }
        for segment in &segments {
            if segment.open >= segment.close {
                return Err(CalendarError::MalformedWindow(format!(
                    "segment opens at {} but closes at {}",
                    segment.open, segment.close
                )));
            }
        }
        for pair in segments.windows(2) {
            if pair[0].close > pair[1].open {
                return Err(CalendarError::MalformedWindow(format!(
                    "segment closing at {} overlaps segment opening at {}",
                    pair[0].close, pair[1].open
                )));
            }
        }
        Ok(Self { segments })
    }

    #[must_use]
    pub fn segments(&self) -> &[SessionSegment] {
        &self.segments
    }

    #[must_use]
    pub fn first(&self) -> &SessionSegment {
        &self.segments[0]
    }

    #[must_use]
    pub fn last(&self) -> &SessionSegment {
        &self.segments[self.segments.len() - 1]
    }

    /// Open of the first segment.
    #[must_use]
    pub fn open(&self) -> NaiveDateTime {
        self.first().open
    }

    /// Close of the last segment.
    #[must_use]
    pub fn close(&self) -> NaiveDateTime {
        self.last().close
    }

    /// Whether `instant` lies within `[open - margin, close + margin]`.
    #[must_use]
    pub fn contains_with_margin(&self, instant: NaiveDateTime, margin: Duration) -> bool {
        self.open() - margin <= instant && instant <= self.close() + margin
    }

    /// Classify `instant` against this window.
    pub fn stage_at(&self, instant: NaiveDateTime) -> Result<MarketTimeStage, CalendarError> {
        let auction_start = self.open() - Duration::minutes(AUCTION_LEAD_MINUTES);
        if instant < auction_start {
            return Ok(MarketTimeStage::BeforeOpen);
        }
        if instant < self.open() {
            return Ok(MarketTimeStage::AggregateAuction);
        }
        if self.segments.iter().any(|s| s.contains(instant)) {
            return Ok(MarketTimeStage::Open);
        }
        let in_break = self
            .segments
            .windows(2)
            .any(|pair| pair[0].close < instant && instant < pair[1].open);
        if in_break {
            return Ok(MarketTimeStage::Break);
        }
        if instant > self.close() {
            return Ok(MarketTimeStage::Close);
        }
        Err(CalendarError::InternalConsistencyViolation(format!(
            "no stage for {instant} in window {}..{}",
            self.open(),
            self.close()
        )))
    }

    /// Milliseconds of trading time elapsed up to `instant`.
    #[must_use]
    pub fn trading_millis(&self, instant: NaiveDateTime) -> i64 {
        self.segments
            .iter()
            .filter(|s| s.open < instant)
            .map(|s| (instant.min(s.close) - s.open).num_milliseconds())
            .sum()
    }

    /// Total scheduled trading time.
    #[must_use]
    pub fn total_millis(&self) -> i64 {
        self.segments
            .iter()
            .map(|s| s.duration().num_milliseconds())
            .sum()
    }
}

/// Intraday stage of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketTimeStage {
    BeforeOpen,
    AggregateAuction,
    Open,
    Break,
    Close,
}

impl fmt::Display for MarketTimeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MarketTimeStage::BeforeOpen => "before_open",
            MarketTimeStage::AggregateAuction => "aggregate_auction",
            MarketTimeStage::Open => "open",
            MarketTimeStage::Break => "break",
            MarketTimeStage::Close => "close",
        };
        f.write_str(name)
    }
}

/// The trading day and session an instant belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TradingMarketInfo {
    pub trading_day: NaiveDate,
    pub market_type: MarketType,
    pub window: SessionWindow,
}

impl TradingMarketInfo {
    #[must_use]
    pub fn market_open(&self) -> NaiveDateTime {
        self.window.open()
    }

    #[must_use]
    pub fn market_close(&self) -> NaiveDateTime {
        self.window.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2018, 10, 25)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    fn commodity_day() -> SessionWindow {
        SessionWindow::new(vec![
            SessionSegment::new(at(9, 0), at(10, 15)),
            SessionSegment::new(at(10, 30), at(11, 30)),
            SessionSegment::new(at(13, 30), at(15, 0)),
        ])
        .unwrap()
    }

    #[test]
    fn rejects_malformed_windows() {
        assert!(matches!(
            SessionWindow::new(vec![]),
            Err(CalendarError::MalformedWindow(_))
        ));
        assert!(SessionWindow::new(vec![SessionSegment::new(at(10, 0), at(9, 0))]).is_err());
        assert!(SessionWindow::new(vec![
            SessionSegment::new(at(9, 0), at(11, 0)),
            SessionSegment::new(at(10, 0), at(12, 0)),
        ])
        .is_err());
    }

    #[test]
    fn adjacent_segments_are_allowed() {
        let window = SessionWindow::new(vec![
            SessionSegment::new(at(9, 0), at(10, 0)),
            SessionSegment::new(at(10, 0), at(11, 0)),
        ])
        .unwrap();
        assert_eq!(window.stage_at(at(10, 0)).unwrap(), MarketTimeStage::Open);
    }

    #[test]
    fn stages_across_the_day() {
        let window = commodity_day();
        let cases = [
            (at(8, 0), MarketTimeStage::BeforeOpen),
            (at(8, 54), MarketTimeStage::BeforeOpen),
            (at(8, 55), MarketTimeStage::AggregateAuction),
            (at(8, 59), MarketTimeStage::AggregateAuction),
            (at(9, 0), MarketTimeStage::Open),
            (at(10, 15), MarketTimeStage::Open),
            (at(10, 20), MarketTimeStage::Break),
            (at(12, 0), MarketTimeStage::Break),
            (at(15, 0), MarketTimeStage::Open),
            (at(15, 1), MarketTimeStage::Close),
        ];
        for (instant, expected) in cases {
            assert_eq!(window.stage_at(instant).unwrap(), expected, "at {instant}");
        }
    }

    #[test]
    fn every_minute_has_a_stage() {
        let window = commodity_day();
        let mut instant = at(0, 0);
        while instant < at(23, 59) {
            assert!(window.stage_at(instant).is_ok(), "no stage at {instant}");
            instant += Duration::minutes(1);
        }
    }

    #[test]
    fn trading_millis_skips_breaks() {
        let window = commodity_day();
        assert_eq!(window.trading_millis(at(8, 0)), 0);
        assert_eq!(window.trading_millis(at(9, 30)), 30 * 60_000);
        assert_eq!(window.trading_millis(at(10, 20)), 75 * 60_000);
        assert_eq!(window.trading_millis(at(16, 0)), window.total_millis());
        assert_eq!(window.total_millis(), 225 * 60_000);
    }

    #[test]
    fn margin_is_inclusive() {
        let window = commodity_day();
        let hour = Duration::hours(1);
        assert!(window.contains_with_margin(at(8, 0), hour));
        assert!(window.contains_with_margin(at(16, 0), hour));
        assert!(!window.contains_with_margin(at(7, 59), hour));
        assert!(!window.contains_with_margin(at(16, 1), hour));
    }
}
