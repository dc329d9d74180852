//! Canonical test configurations.

use crate::domain::ProducerConfig;
use crate::testkit::producer::TYPE_NAME as SCRIPTED;

/// Scripted producer that connects on every attempt.
pub fn scripted(id: &str) -> ProducerConfig {
    ProducerConfig::new(id, SCRIPTED)
}

/// Scripted producer with a fixed connect outcome (`connect`, `reject`,
/// `hang`).
pub fn scripted_with(id: &str, behavior: &str) -> ProducerConfig {
    scripted(id).with_parameter("behavior", behavior)
}

/// Fast deterministic simulated producer.
pub fn simulated(id: &str) -> ProducerConfig {
    ProducerConfig::new(id, "simulated")
        .with_parameter("interval_ms", 5)
        .with_parameter("seed", 42)
}

/// Minimal config file with one simulated producer and two instruments.
pub const MINIMAL_TOML: &str = r#"
[logging]
level = "warn"

[market_data]
instrument_ids = "SHFE.ru1901,SHFE.cu1901"
connection_timeout_secs = 5
maintenance_interval_secs = 1

[[market_data.producer]]
id = "sim"
type = "simulated"
interval_ms = 50
"#;
