//! Instrument identity, venues and trading sessions.

mod exchange;
mod futures;
mod instrument;
mod producer_config;
mod registry;
mod session;
mod tick;

pub use exchange::{Exchange, MarketType};
pub use futures::infer_exchange;
pub use instrument::{InstrumentCategory, InstrumentId};
pub use producer_config::ProducerConfig;
pub use registry::{InstrumentRegistry, InstrumentSpec};
pub use session::{
    MarketTimeStage, SessionSegment, SessionWindow, TradingMarketInfo, AUCTION_LEAD_MINUTES,
};
pub use tick::Tick;
