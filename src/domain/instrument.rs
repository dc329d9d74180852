//! Interned instrument identity.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize, Serializer};

use super::exchange::Exchange;

/// Instrument category, derived once from venue and code prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentCategory {
    Stock,
    Bond,
    ConvertibleBond,
    Repurchase,
    Fund,
    Index,
    Future,
    Other,
}

impl InstrumentCategory {
    /// Classify a code listed on `exchange`.
    ///
    /// Prefix rules per venue; anything unmatched is `Other`. Settlement
    /// logic depends on this table, keep it in sync with the venues'
    /// numbering schemes.
    #[must_use]
    pub fn classify(exchange: Exchange, code: &str) -> Self {
        let starts = |prefixes: &[&str]| prefixes.iter().any(|p| code.starts_with(p));
        match exchange {
            Exchange::SSE => {
                if starts(&["00"]) {
                    Self::Index
                } else if starts(&["01"]) {
                    Self::Bond
                } else if starts(&["11"]) {
                    // 110xxx/113xxx convertibles, not plain bonds
                    Self::ConvertibleBond
                } else if starts(&["12"]) {
                    Self::Bond
                } else if starts(&["20"]) {
                    Self::Repurchase
                } else if starts(&["50", "51"]) {
                    Self::Fund
                } else if starts(&["60", "90"]) {
                    // 90xxxx are B shares
                    Self::Stock
                } else {
                    Self::Other
                }
            }
            Exchange::SZSE => {
                if starts(&["00", "20", "30"]) {
                    Self::Stock
                } else if starts(&["10", "11"]) {
                    Self::Bond
                } else if starts(&["12"]) {
                    Self::ConvertibleBond
                } else if starts(&["13"]) {
                    Self::Repurchase
                } else if starts(&["15", "16"]) {
                    Self::Fund
                } else if starts(&["39"]) {
                    Self::Index
                } else {
                    Self::Other
                }
            }
            // 990001 / 990002 are the southbound connect channels
            Exchange::HKEX if starts(&["99"]) => Self::Index,
            Exchange::HKEX => Self::Other,
            Exchange::CFFEX | Exchange::SHFE | Exchange::DCE => Self::Future,
            // not classified; commodity and session lookups use `Exchange::is_futures`
            Exchange::CZCE | Exchange::INE => Self::Other,
        }
    }
}

#[derive(Debug)]
struct InstrumentInner {
    exchange: Exchange,
    code: String,
    name: String,
    commodity: String,
    unique_key: String,
    category: InstrumentCategory,
    int_id: u32,
}

/// Handle to an interned instrument.
///
/// Cheap to clone. Instances are only created by
/// [`InstrumentRegistry`](super::registry::InstrumentRegistry), which
/// guarantees that one unique key maps to one `int_id` for the lifetime of
/// the registry. Equality and hashing use that id.
#[derive(Clone)]
pub struct InstrumentId(Arc<InstrumentInner>);

impl InstrumentId {
    pub(crate) fn new(exchange: Exchange, code: &str, name: Option<&str>, int_id: u32) -> Self {
        let code = code.trim().to_string();
        let commodity = if exchange.is_futures() {
            futures_commodity(&code).to_string()
        } else {
            code.clone()
        };
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map_or_else(|| code.clone(), str::to_string);
        Self(Arc::new(InstrumentInner {
            exchange,
            category: InstrumentCategory::classify(exchange, &code),
            unique_key: format!("{}.{}", exchange.name(), code),
            commodity,
            code,
            name,
            int_id,
        }))
    }

    #[must_use]
    pub fn exchange(&self) -> Exchange {
        self.0.exchange
    }

    /// Venue-local code, e.g. `600000` or `ru1901`.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.0.code
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// `EXCHANGE.code`, globally unique.
    #[must_use]
    pub fn unique_key(&self) -> &str {
        &self.0.unique_key
    }

    #[must_use]
    pub fn int_id(&self) -> u32 {
        self.0.int_id
    }

    #[must_use]
    pub fn category(&self) -> InstrumentCategory {
        self.0.category
    }

    /// Futures product (`ru` for `ru1901`); the code itself for securities.
    #[must_use]
    pub fn commodity(&self) -> &str {
        &self.0.commodity
    }

    #[must_use]
    pub fn is_bond_like(&self) -> bool {
        matches!(
            self.0.category,
            InstrumentCategory::Bond | InstrumentCategory::ConvertibleBond
        )
    }

    /// Settlement cycle: `0` for same-day (T+0), `1` for next-day (T+1).
    #[must_use]
    pub fn settlement_period(&self) -> u8 {
        if !self.0.exchange.has_deferred_settlement() {
            return 0;
        }
        match self.0.category {
            InstrumentCategory::Bond => 0,
            _ => 1,
        }
    }

    /// Unique key followed by the display name when it differs from the code.
    #[must_use]
    pub fn to_printable_string(&self) -> String {
        if self.0.name == self.0.code {
            self.0.unique_key.clone()
        } else {
            format!("{} {}", self.0.unique_key, self.0.name)
        }
    }
}

/// Leading ASCII letters of a futures code.
pub(crate) fn futures_commodity(code: &str) -> &str {
    let end = code
        .char_indices()
        .find(|(_, c)| !c.is_ascii_alphabetic())
        .map_or(code.len(), |(i, _)| i);
    &code[..end]
}

impl PartialEq for InstrumentId {
    fn eq(&self, other: &Self) -> bool {
        self.0.int_id == other.0.int_id
    }
}

impl Eq for InstrumentId {}

impl Hash for InstrumentId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.int_id.hash(state);
    }
}

impl PartialOrd for InstrumentId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InstrumentId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.unique_key.cmp(&other.0.unique_key)
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.unique_key)
    }
}

impl fmt::Debug for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstrumentId({}#{})", self.0.unique_key, self.0.int_id)
    }
}

impl Serialize for InstrumentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.unique_key)
    }
}
