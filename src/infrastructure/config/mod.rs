//! Configuration loading and validation.

mod calendar;
mod logging;
mod market_data;
mod settings;

pub use calendar::CalendarConfig;
pub use logging::LoggingConfig;
pub use market_data::MarketDataConfig;
pub use settings::Config;
