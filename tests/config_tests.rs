use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tempfile::NamedTempFile;
use tickwarden::application::service::{MarketDataService, ServiceSettings};
use tickwarden::domain::InstrumentRegistry;
use tickwarden::error::{ConfigError, Error};
use tickwarden::infrastructure::config::Config;
use tickwarden::infrastructure::runner::apply_config;
use tickwarden::port::ProducerStatus;
use tickwarden::testkit::{config::MINIMAL_TOML, wait_until, RecordingListener};

fn write_temp_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

#[test]
fn loads_config_from_file() {
    let file = write_temp_config(MINIMAL_TOML);
    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.logging.level, "warn");
    assert_eq!(config.market_data.connection_timeout(), Duration::from_secs(5));
    assert_eq!(config.market_data.maintenance_interval(), Duration::from_secs(1));
    assert_eq!(config.market_data.producers[0].id, "sim");
}

#[test]
fn missing_file_is_a_read_error() {
    match Config::load("/nonexistent/tickwarden/config.toml") {
        Err(Error::Config(ConfigError::ReadFile(_))) => {}
        Err(err) => panic!("Expected read error, got {err}"),
        Ok(_) => panic!("Expected read error"),
    }
}

#[test]
fn invalid_logging_format_is_rejected() {
    let file = write_temp_config("[logging]\nformat = \"xml\"\n");
    match Config::load(file.path()) {
        Err(Error::Config(ConfigError::InvalidValue {
            field: "logging.format",
            ..
        })) => {}
        Err(err) => panic!("Expected invalid format error, got {err}"),
        Ok(_) => panic!("Expected invalid format error"),
    }
}

#[tokio::test]
async fn applied_config_streams_simulated_ticks() {
    let config = Config::parse_toml(
        r#"
[market_data]
instrument_ids = "SHFE.ru1901"

[[market_data.producer]]
id = "sim"
type = "simulated"
interval_ms = 5
seed = 1
"#,
    )
    .unwrap();

    let registry = Arc::new(InstrumentRegistry::new());
    let service = MarketDataService::builder(registry.clone())
        .settings(ServiceSettings::from_config(&config.market_data))
        .build();
    let ru = registry.parse("SHFE.ru1901").unwrap();
    let listener = Arc::new(RecordingListener::default());
    service.add_listener(listener.clone(), &[ru.clone()]);

    apply_config(&service, &config);
    let sim = service.producer("sim").unwrap();
    wait_until(Duration::from_secs(2), || sim.status() == ProducerStatus::Connected).await;
    wait_until(Duration::from_secs(2), || listener.ticks().len() >= 3).await;

    assert!(listener.ticks().iter().all(|t| t.instrument == ru));
    service.shutdown();
}
