//! Config file change detection by modification time.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::warn;

/// Polls a file's modification time.
///
/// The first poll always reports a change so the initial load goes through
/// the same path as later reloads.
#[derive(Debug)]
pub struct ConfigWatcher {
    path: PathBuf,
    last_seen: Option<SystemTime>,
    primed: bool,
}

impl ConfigWatcher {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_seen: None,
            primed: false,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file changed since the previous poll.
    ///
    /// A file that cannot be inspected counts as unchanged.
    pub fn poll_changed(&mut self) -> bool {
        let modified = match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cannot stat config file");
                return false;
            }
        };
        let changed = !self.primed || self.last_seen != Some(modified);
        self.primed = true;
        self.last_seen = Some(modified);
        changed
    }
}
