//! Trait definitions at the seams of the service. Depend only on domain.
//!
//! # Available Ports
//!
//! - [`MarketDayOracle`], [`SessionTable`] - Venue calendars and session templates
//! - [`MarketDataProducer`], [`ProducerSink`], [`ProducerFactory`] - Feed connections,
//!   their callbacks and construction
//! - [`MarketDataListener`] - Downstream tick consumers
//! - [`TickRecorder`] - Persistence of every received tick

mod calendar;
mod listener;
mod producer;

pub use calendar::{MarketDayOracle, SessionTable, MAX_CALENDAR_SCAN_DAYS};
pub use listener::{MarketDataListener, NullRecorder, TickRecorder};
pub use producer::{
    MarketDataProducer, ProducerContext, ProducerFactory, ProducerInfo, ProducerSink,
    ProducerStatus,
};
