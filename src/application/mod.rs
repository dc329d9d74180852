//! Application services.
//!
//! - [`calendar`] - Trading day resolution and session stages
//! - [`service`] - Producer orchestration and tick fan-out

pub mod calendar;
pub mod service;
