//! Process-lifetime instrument interning.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::Deserialize;
use tracing::debug;

use super::exchange::Exchange;
use super::futures::infer_exchange;
use super::instrument::InstrumentId;
use crate::error::InstrumentError;

/// One entry of an instrument master list used to seed the registry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstrumentSpec {
    pub exchange: Exchange,
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl InstrumentSpec {
    pub fn new(exchange: Exchange, code: impl Into<String>, name: Option<&str>) -> Self {
        Self {
            exchange,
            code: code.into(),
            name: name.map(str::to_string),
        }
    }
}

#[derive(Default)]
struct RegistryState {
    by_key: HashMap<String, InstrumentId>,
    next_id: u32,
}

/// Interns instrument identities and hands out stable integer ids.
///
/// Entries are never evicted. All mutation happens under a single mutex so
/// id assignment is strictly sequential; lookups of already interned keys
/// take the same lock briefly.
pub struct InstrumentRegistry {
    state: Mutex<RegistryState>,
}

impl InstrumentRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Registry preloaded with the HKEX southbound connect channels.
    #[must_use]
    pub fn with_builtin_seeds() -> Self {
        let registry = Self::new();
        registry.preload([
            InstrumentSpec::new(Exchange::HKEX, "990001", Some("Southbound (SH)")),
            InstrumentSpec::new(Exchange::HKEX, "990002", Some("Southbound (SZ)")),
        ]);
        registry
    }

    /// Intern `(venue, code)`, resolving the venue by name.
    pub fn intern(
        &self,
        venue: &str,
        code: &str,
        name: Option<&str>,
    ) -> Result<InstrumentId, InstrumentError> {
        let exchange = Exchange::from_name(venue).ok_or_else(|| {
            InstrumentError::invalid(&format!("{venue}.{code}"), "unknown exchange")
        })?;
        check_code(code, &format!("{venue}.{code}"))?;
        Ok(self.intern_exchange(exchange, code, name))
    }

    /// Intern an instrument on a known venue.
    pub fn intern_exchange(&self, exchange: Exchange, code: &str, name: Option<&str>) -> InstrumentId {
        let code = code.trim();
        let key = format!("{}.{}", exchange.name(), code);
        let mut state = self.state.lock();
        if let Some(existing) = state.by_key.get(&key) {
            return existing.clone();
        }
        let id = InstrumentId::new(exchange, code, name, state.next_id);
        state.next_id += 1;
        debug!(instrument = %key, int_id = id.int_id(), "Interned instrument");
        state.by_key.insert(key, id.clone());
        id
    }

    /// Parse `VENUE.CODE`, `CODE.VENUE` or a bare futures code.
    ///
    /// When the text before the dot is not a venue the two halves are
    /// swapped and tried once more. This is a convenience for hand-written
    /// lists, not a validation step.
    pub fn parse(&self, text: &str) -> Result<InstrumentId, InstrumentError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(InstrumentError::invalid(text, "empty identifier"));
        }
        if let Some(existing) = self.get(text) {
            return Ok(existing);
        }

        let Some((head, tail)) = text.split_once('.') else {
            let exchange = infer_exchange(text).ok_or_else(|| {
                InstrumentError::invalid(text, "no exchange given and none could be inferred")
            })?;
            return Ok(self.intern_exchange(exchange, text, None));
        };

        let (exchange, code) = match Exchange::from_name(head) {
            Some(exchange) => (exchange, tail),
            None => match Exchange::from_name(tail) {
                Some(exchange) => (exchange, head),
                None => return Err(InstrumentError::invalid(text, "unknown exchange")),
            },
        };
        check_code(code, text)?;
        Ok(self.intern_exchange(exchange, code, None))
    }

    /// Seed the registry with known instruments.
    ///
    /// Specs for keys that are already interned keep the existing entry.
    pub fn preload<I>(&self, specs: I) -> Vec<InstrumentId>
    where
        I: IntoIterator<Item = InstrumentSpec>,
    {
        specs
            .into_iter()
            .map(|spec| self.intern_exchange(spec.exchange, &spec.code, spec.name.as_deref()))
            .collect()
    }

    /// Look up an already interned instrument by unique key.
    #[must_use]
    pub fn get(&self, unique_key: &str) -> Option<InstrumentId> {
        self.state.lock().by_key.get(unique_key).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().by_key.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InstrumentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn check_code(code: &str, input: &str) -> Result<(), InstrumentError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(InstrumentError::invalid(input, "empty instrument code"));
    }
    if code.chars().any(|c| c.is_whitespace() || c == '.') {
        return Err(InstrumentError::invalid(input, "malformed instrument code"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::instrument::InstrumentCategory;

    #[test]
    fn intern_returns_same_identity() {
        let registry = InstrumentRegistry::new();
        let a = registry.intern("SSE", "600000", None).unwrap();
        let b = registry.intern("sse", "600000", None).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.int_id(), b.int_id());
        assert_eq!(a.unique_key(), "SSE.600000");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn int_ids_are_sequential_and_never_reused() {
        let registry = InstrumentRegistry::new();
        let ids: Vec<u32> = ["600000", "600001", "600002", "600000"]
            .iter()
            .map(|code| registry.intern_exchange(Exchange::SSE, code, None).int_id())
            .collect();
        assert_eq!(ids, vec![0, 1, 2, 0]);
    }

    #[test]
    fn intern_rejects_unknown_venue() {
        let registry = InstrumentRegistry::new();
        let err = registry.intern("NYSE", "IBM", None).unwrap_err();
        assert!(matches!(err, InstrumentError::InvalidIdentifier { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn parse_accepts_both_orders() {
        let registry = InstrumentRegistry::new();
        let a = registry.parse("SSE.600000").unwrap();
        let b = registry.parse("600000.SSE").unwrap();
        assert_eq!(a, b);
        assert_eq!(b.category(), InstrumentCategory::Stock);
    }

    #[test]
    fn parse_infers_futures_venue() {
        let registry = InstrumentRegistry::new();
        let ru = registry.parse("ru1901").unwrap();
        assert_eq!(ru.exchange(), Exchange::SHFE);
        assert_eq!(ru, registry.parse("SHFE.ru1901").unwrap());
    }

    #[test]
    fn parse_failures() {
        let registry = InstrumentRegistry::new();
        for input in ["", "600000", "FOO.BAR", "SSE.", "SSE.60 00"] {
            assert!(
                matches!(
                    registry.parse(input),
                    Err(InstrumentError::InvalidIdentifier { .. })
                ),
                "{input:?} should not parse"
            );
        }
    }

    #[test]
    fn preload_keeps_names_and_ids() {
        let registry = InstrumentRegistry::with_builtin_seeds();
        let ggt = registry.get("HKEX.990001").unwrap();
        assert_eq!(ggt.name(), "Southbound (SH)");
        assert_eq!(ggt.category(), InstrumentCategory::Index);
        assert_eq!(registry.parse("HKEX.990001").unwrap().int_id(), ggt.int_id());
    }
}
