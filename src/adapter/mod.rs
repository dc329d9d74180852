//! Adapters implementing the ports.
//!
//! - [`producer`] - Market data producer bindings

pub mod producer;
