//! Handler for the `stage` command.

use std::path::Path;

use chrono::NaiveDateTime;

use crate::application::calendar::TradingCalendar;
use crate::cli::StageArgs;
use crate::domain::InstrumentRegistry;
use crate::error::{ConfigError, Result};
use crate::infrastructure::config::{CalendarConfig, Config};

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// Parse a local exchange time.
pub fn parse_datetime(text: &str) -> Result<NaiveDateTime> {
    let text = text.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .ok_or_else(|| {
            ConfigError::InvalidValue {
                field: "datetime",
                reason: format!("expected YYYY-MM-DD HH:MM[:SS], got '{text}'"),
            }
            .into()
        })
}

/// Print the trading day, session and stage of an instant.
pub fn execute(args: &StageArgs) -> Result<()> {
    let registry = InstrumentRegistry::with_builtin_seeds();
    let calendar_config = match &args.config {
        Some(path) => load_calendar(path, &registry)?,
        None => CalendarConfig::default(),
    };
    let calendar = TradingCalendar::builtin(&calendar_config)?;

    let instrument = registry.parse(&args.instrument)?;
    let instant = parse_datetime(&args.datetime)?;

    println!("Instrument:   {}", instrument.to_printable_string());
    println!("Category:     {:?}", instrument.category());
    println!("Instant:      {instant}");

    let Some(info) = calendar.resolve_trading_context(&instrument, instant) else {
        println!("Session:      none (outside trading hours)");
        return Ok(());
    };
    let stage = info.window.stage_at(instant)?;
    println!("Trading day:  {}", info.trading_day);
    println!("Market:       {}", info.market_type);
    println!("Window:       {} - {}", info.market_open(), info.market_close());
    println!("Stage:        {stage}");
    println!("Trading ms:   {}", info.window.trading_millis(instant));
    Ok(())
}

fn load_calendar(path: &Path, registry: &InstrumentRegistry) -> Result<CalendarConfig> {
    let config = Config::load(path)?;
    registry.preload(config.instruments);
    Ok(config.calendar)
}
