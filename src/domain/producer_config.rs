//! Declarative producer configuration.

use serde::{Deserialize, Serialize};

/// Parameter keys whose values are hidden from status output.
const SENSITIVE_MARKERS: &[&str] = &["password", "secret", "token", "key"];

const MASK: &str = "******";

/// One `[[market_data.producer]]` entry.
///
/// Two configs are equal when id, type and every parameter match; the
/// service uses this to decide whether a running producer must be rebuilt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProducerConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub parameters: toml::Table,
}

impl ProducerConfig {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            parameters: toml::Table::new(),
        }
    }

    /// Builder-style parameter setter.
    #[must_use]
    pub fn with_parameter(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    /// Parameters as JSON with credential-like values replaced by a mask.
    #[must_use]
    pub fn masked_parameters(&self) -> serde_json::Value {
        let masked = self
            .parameters
            .iter()
            .map(|(key, value)| {
                let lowered = key.to_ascii_lowercase();
                let value = if SENSITIVE_MARKERS.iter().any(|m| lowered.contains(m)) {
                    serde_json::Value::String(MASK.to_string())
                } else {
                    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
                };
                (key.clone(), value)
            })
            .collect();
        serde_json::Value::Object(masked)
    }
}
