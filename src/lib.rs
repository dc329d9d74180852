//! Tickwarden - real-time market tick ingestion.
//!
//! Interns instrument identities, resolves trading days and session stages
//! for Chinese and Hong Kong venues, and supervises the feed producers that
//! deliver ticks to registered listeners.
//!
//! # Architecture
//!
//! - **`domain`** - Instruments, venues, session windows, ticks, producer configs
//! - **`port`** - Traits at the seams: producers, listeners, calendar sources
//! - **`adapter::producer`** - Built-in feed bindings (`simulated`, `websocket`)
//! - **`application`** - Trading calendar and the feed orchestrator
//! - **`infrastructure`** - Config, worker pool, maintenance runner, status file
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tickwarden::application::service::MarketDataService;
//! use tickwarden::domain::{InstrumentRegistry, ProducerConfig};
//!
//! # async fn demo() {
//! let service = MarketDataService::builder(Arc::new(InstrumentRegistry::new())).build();
//! service.reload_instrument_ids("SHFE.ru1901, SHFE.cu1901");
//! service.reload_producers(&[ProducerConfig::new("sim", "simulated")]);
//! # }
//! ```

pub mod adapter;
pub mod application;
pub mod cli;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
