//! Status file for external monitoring.
//!
//! A JSON snapshot of the service that other tools can poll: producer
//! status with masked parameters, the subscription set and pool counters.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::service::MarketDataService;
use crate::domain::InstrumentId;
use crate::error::Result;
use crate::port::ProducerInfo;

/// Current status file format version.
const STATUS_VERSION: &str = "1";

/// Top-level status file structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusFile {
    /// Schema version for forward compatibility.
    pub version: String,
    pub started_at: DateTime<Utc>,
    pub pid: u32,
    pub producers: Vec<ProducerInfo>,
    /// Unique keys of every subscribed instrument.
    pub subscriptions: Vec<String>,
    /// Unique keys of the configured instrument list.
    pub instrument_ids: Vec<String>,
    /// Jobs dropped by the worker pool since start.
    pub rejected_tasks: u64,
    pub updated_at: DateTime<Utc>,
}

impl StatusFile {
    /// Read a status file written by [`StatusWriter`].
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Writes [`StatusFile`] snapshots atomically.
pub struct StatusWriter {
    path: PathBuf,
    started_at: DateTime<Utc>,
}

impl StatusWriter {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            started_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn snapshot(&self, service: &MarketDataService) -> StatusFile {
        StatusFile {
            version: STATUS_VERSION.to_string(),
            started_at: self.started_at,
            pid: std::process::id(),
            producers: service.producers(),
            subscriptions: unique_keys(&service.subscriptions()),
            instrument_ids: unique_keys(&service.instrument_ids()),
            rejected_tasks: service.rejected_tasks(),
            updated_at: Utc::now(),
        }
    }

    /// Write the current snapshot of `service`.
    ///
    /// Writes to a temp file and renames it over the target, creating the
    /// parent directory if needed.
    pub fn write(&self, service: &MarketDataService) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.snapshot(service))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)?;

        let cleanup_and_err = |e| {
            let _ = fs::remove_file(&temp_path);
            e
        };

        file.write_all(json.as_bytes()).map_err(cleanup_and_err)?;
        file.sync_all().map_err(cleanup_and_err)?;
        fs::rename(&temp_path, &self.path).map_err(cleanup_and_err)?;

        Ok(())
    }
}

fn unique_keys(ids: &[InstrumentId]) -> Vec<String> {
    ids.iter().map(|id| id.unique_key().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::InstrumentRegistry;
    use crate::testkit::{config, ScriptedProducerFactory};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn writes_snapshot_atomically() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("status.json");
        let service = MarketDataService::builder(Arc::new(InstrumentRegistry::new()))
            .factory(Arc::new(ScriptedProducerFactory::default()))
            .build();
        service.reload_instrument_ids("SHFE.ru1901");
        service.reload_producers(&[config::scripted("p1").with_parameter("password", "hunter2")]);

        let writer = StatusWriter::new(path.clone());
        writer.write(&service).unwrap();

        assert!(!path.with_extension("tmp").exists());
        let status = StatusFile::read(&path).unwrap();
        assert_eq!(status.version, "1");
        assert_eq!(status.pid, std::process::id());
        assert_eq!(status.subscriptions, vec!["SHFE.ru1901"]);
        assert_eq!(status.producers.len(), 1);
        assert_eq!(status.producers[0].id, "p1");
        assert_eq!(status.producers[0].parameters["password"], "******");
        service.shutdown();
    }

    #[tokio::test]
    async fn rewrite_keeps_started_at() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("status.json");
        let service = MarketDataService::builder(Arc::new(InstrumentRegistry::new())).build();
        let writer = StatusWriter::new(path.clone());

        writer.write(&service).unwrap();
        let first = StatusFile::read(&path).unwrap();
        writer.write(&service).unwrap();
        let second = StatusFile::read(&path).unwrap();

        assert_eq!(first.started_at, second.started_at);
        assert!(second.updated_at >= first.updated_at);
    }
}
