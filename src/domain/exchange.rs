//! Trading venues and session types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InstrumentError;

/// A trading venue.
///
/// Names follow the exchanges' own abbreviations and parse
/// case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Exchange {
    /// Shanghai Stock Exchange.
    #[serde(alias = "sse")]
    SSE,
    /// Shenzhen Stock Exchange.
    #[serde(alias = "szse")]
    SZSE,
    /// Hong Kong Exchanges (connect channels only).
    #[serde(alias = "hkex")]
    HKEX,
    /// China Financial Futures Exchange.
    #[serde(alias = "cffex")]
    CFFEX,
    /// Shanghai Futures Exchange.
    #[serde(alias = "shfe")]
    SHFE,
    /// Dalian Commodity Exchange.
    #[serde(alias = "dce")]
    DCE,
    /// Zhengzhou Commodity Exchange.
    #[serde(alias = "czce")]
    CZCE,
    /// Shanghai International Energy Exchange.
    #[serde(alias = "ine")]
    INE,
}

impl Exchange {
    pub const ALL: [Exchange; 8] = [
        Exchange::SSE,
        Exchange::SZSE,
        Exchange::HKEX,
        Exchange::CFFEX,
        Exchange::SHFE,
        Exchange::DCE,
        Exchange::CZCE,
        Exchange::INE,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Exchange::SSE => "SSE",
            Exchange::SZSE => "SZSE",
            Exchange::HKEX => "HKEX",
            Exchange::CFFEX => "CFFEX",
            Exchange::SHFE => "SHFE",
            Exchange::DCE => "DCE",
            Exchange::CZCE => "CZCE",
            Exchange::INE => "INE",
        }
    }

    /// Look up a venue by name, ignoring ASCII case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Exchange> {
        Self::ALL
            .iter()
            .copied()
            .find(|e| e.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Whether the venue runs an evening session attributed to the next
    /// trading day.
    #[must_use]
    pub const fn has_night_market(self) -> bool {
        matches!(
            self,
            Exchange::SHFE | Exchange::DCE | Exchange::CZCE | Exchange::INE
        )
    }

    #[must_use]
    pub const fn is_futures(self) -> bool {
        matches!(
            self,
            Exchange::CFFEX | Exchange::SHFE | Exchange::DCE | Exchange::CZCE | Exchange::INE
        )
    }

    /// Venues where the settlement cycle depends on the instrument category.
    #[must_use]
    pub const fn has_deferred_settlement(self) -> bool {
        matches!(self, Exchange::SSE | Exchange::SZSE)
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Exchange {
    type Err = InstrumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Exchange::from_name(s).ok_or_else(|| InstrumentError::invalid(s, "unknown exchange"))
    }
}

/// Session type within a trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    Day,
    Night,
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketType::Day => f.write_str("day"),
            MarketType::Night => f.write_str("night"),
        }
    }
}
