//! Producer bindings and their shared state machine.
//!
//! - [`simulated`] - In-process random-walk feed
//! - [`websocket`] - JSON-over-WebSocket feed
//! - [`BuiltinProducerFactory`] - Dispatches a config to its binding by type name

pub mod simulated;
pub mod state;
pub mod websocket;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::de::DeserializeOwned;

pub use simulated::SimulatedProducer;
pub use state::{ProducerState, Session};
pub use websocket::WebSocketProducer;

use crate::domain::{Exchange, InstrumentId, ProducerConfig};
use crate::error::ProducerError;
use crate::port::{MarketDataProducer, ProducerContext, ProducerFactory};

/// Producer bindings shipped with the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerType {
    Simulated,
    WebSocket,
}

impl ProducerType {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ProducerType::Simulated => simulated::TYPE_NAME,
            ProducerType::WebSocket => websocket::TYPE_NAME,
        }
    }
}

impl fmt::Display for ProducerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProducerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            simulated::TYPE_NAME => Ok(ProducerType::Simulated),
            websocket::TYPE_NAME | "ws" => Ok(ProducerType::WebSocket),
            other => Err(format!("unknown producer type '{other}'")),
        }
    }
}

/// Factory for the built-in bindings.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinProducerFactory;

impl ProducerFactory for BuiltinProducerFactory {
    fn create(
        &self,
        config: &ProducerConfig,
        context: &ProducerContext,
    ) -> Result<Arc<dyn MarketDataProducer>, ProducerError> {
        let kind: ProducerType =
            config
                .kind
                .parse()
                .map_err(|reason| ProducerError::ConstructionFailed {
                    id: config.id.clone(),
                    reason,
                })?;
        let producer: Arc<dyn MarketDataProducer> = match kind {
            ProducerType::Simulated => Arc::new(SimulatedProducer::new(
                config.clone(),
                Arc::clone(&context.sink),
            )?),
            ProducerType::WebSocket => Arc::new(WebSocketProducer::new(
                config.clone(),
                Arc::clone(&context.sink),
                Arc::clone(&context.registry),
            )?),
        };
        Ok(producer)
    }
}

/// Decode a config's free-form parameters into a binding's typed params.
pub(crate) fn decode_parameters<T: DeserializeOwned>(
    config: &ProducerConfig,
) -> Result<T, ProducerError> {
    toml::Value::Table(config.parameters.clone())
        .try_into()
        .map_err(|e: toml::de::Error| ProducerError::ConstructionFailed {
            id: config.id.clone(),
            reason: e.to_string(),
        })
}

/// Empty venue filter serves every venue.
pub(crate) fn serves_exchange(exchanges: &[Exchange], instrument: &InstrumentId) -> bool {
    exchanges.is_empty() || exchanges.contains(&instrument.exchange())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::InstrumentRegistry;
    use crate::testkit::RecordingSink;

    fn context() -> ProducerContext {
        ProducerContext {
            sink: Arc::new(RecordingSink::default()),
            registry: Arc::new(InstrumentRegistry::new()),
        }
    }

    #[test]
    fn parses_type_names() {
        assert_eq!("simulated".parse(), Ok(ProducerType::Simulated));
        assert_eq!("WebSocket".parse(), Ok(ProducerType::WebSocket));
        assert!("ctp".parse::<ProducerType>().is_err());
    }

    #[test]
    fn creates_builtin_bindings() {
        let factory = BuiltinProducerFactory;
        let sim = factory
            .create(&ProducerConfig::new("a", "simulated"), &context())
            .unwrap();
        let ws = factory
            .create(
                &ProducerConfig::new("b", "websocket").with_parameter("url", "ws://localhost:1"),
                &context(),
            )
            .unwrap();
        assert_eq!(sim.producer_type(), "simulated");
        assert_eq!(ws.producer_type(), "websocket");
        assert_eq!(ws.id(), "b");
    }

    #[test]
    fn unknown_type_or_bad_parameters_fail_construction() {
        let factory = BuiltinProducerFactory;
        let unknown = factory.create(&ProducerConfig::new("x", "ctp"), &context());
        let bad = factory.create(
            &ProducerConfig::new("y", "simulated").with_parameter("interval_ms", "fast"),
            &context(),
        );
        let missing_url = factory.create(&ProducerConfig::new("z", "websocket"), &context());
        for result in [unknown, bad, missing_url] {
            assert!(matches!(
                result,
                Err(ProducerError::ConstructionFailed { .. })
            ));
        }
    }
}
