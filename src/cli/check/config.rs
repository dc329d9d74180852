use std::path::Path;

use crate::adapter::producer::ProducerType;
use crate::domain::InstrumentRegistry;
use crate::error::Result;
use crate::infrastructure::config::Config;

/// Validate a configuration file without starting the service.
pub fn execute_config<P: AsRef<Path>>(config_path: P) -> Result<()> {
    let path = config_path.as_ref();
    println!("Checking configuration: {}", path.display());
    println!();

    let config = Config::load(path)?;
    println!("✓ Configuration file is valid");
    println!();

    let market_data = &config.market_data;
    println!("Summary:");
    println!("  Log level: {} ({})", config.logging.level, config.logging.format);
    println!("  Producers: {}", market_data.producers.len());
    println!(
        "  Connection timeout: {}s, maintenance every {}s",
        market_data.connection_timeout_secs, market_data.maintenance_interval_secs
    );
    println!(
        "  Workers: {} (queue {})",
        market_data.worker_count, market_data.task_queue_capacity
    );
    println!("  Master instruments: {}", config.instruments.len());
    println!("  Holidays: {}", config.calendar.holidays.len());
    match &config.status_file {
        Some(path) => println!("  Status file: {}", path.display()),
        None => println!("  Status file: disabled"),
    }
    println!();

    for producer in &market_data.producers {
        match producer.kind.parse::<ProducerType>() {
            Ok(kind) => println!("✓ Producer '{}' ({kind})", producer.id),
            Err(reason) => println!("⚠ Producer '{}': {reason}", producer.id),
        }
    }

    let registry = InstrumentRegistry::with_builtin_seeds();
    registry.preload(config.instruments.iter().cloned());
    let mut valid = 0;
    for entry in market_data
        .instrument_ids
        .split([',', ';', '\r', '\n'])
        .map(str::trim)
        .filter(|e| !e.is_empty())
    {
        match registry.parse(entry) {
            Ok(_) => valid += 1,
            Err(e) => println!("⚠ {e}"),
        }
    }
    println!("  Instrument ids: {valid} valid");

    println!();
    println!("Configuration is ready to use.");
    Ok(())
}
