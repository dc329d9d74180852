//! Infrastructure layer.
//!
//! Technical concerns that support the application without containing
//! market logic.
//!
//! # Submodules
//!
//! - [`config`] - Configuration loading and validation
//! - [`runner`] - Periodic maintenance loop
//! - [`status_file`] - JSON status snapshot for external monitoring
//! - [`task_pool`] - Bounded async worker pool
//! - [`watcher`] - Config file change detection

pub mod config;
pub mod runner;
pub mod status_file;
pub mod task_pool;
pub mod watcher;
