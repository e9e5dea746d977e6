//! Durable LoopState persistence.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{debug, info, warn};

use super::atomic::write_atomic;
use crate::domain::LoopState;
use crate::error::{Result, SuperloopError};

/// State file name inside the state directory.
pub const STATE_FILE: &str = "state.json";

/// Storage backend for a single loop's state.
pub trait StateStore: Send + Sync {
    /// Load the state; a missing document yields a fresh idle state.
    fn load(&self) -> Result<LoopState>;

    /// Persist the state so that readers never observe a partial write.
    fn save(&self, state: &LoopState) -> Result<()>;
}

/// JSON state file replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    /// Store at `<state_dir>/state.json`.
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            path: state_dir.as_ref().join(STATE_FILE),
        }
    }

    /// Path of the state document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a state document exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Move the current state aside and start over at `idle`.
    ///
    /// The previous document (even a corrupt one) is kept as
    /// `state.json.<timestamp>.bak` for post-mortem.
    pub fn reset(&self) -> Result<Option<PathBuf>> {
        let backup = if self.path.exists() {
            let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
            let backup = self.path.with_file_name(format!("{}.{}.bak", STATE_FILE, stamp));
            fs::rename(&self.path, &backup)?;
            info!("Rotated state {} -> {}", self.path.display(), backup.display());
            Some(backup)
        } else {
            None
        };

        self.save(&LoopState::new())?;
        Ok(backup)
    }

    fn corruption(&self, reason: impl Into<String>) -> SuperloopError {
        SuperloopError::StateCorruption {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<LoopState> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No state at {}, starting idle", self.path.display());
                return Ok(LoopState::new());
            }
            Err(e) => return Err(self.corruption(format!("unreadable: {}", e))),
        };

        let state: LoopState = serde_json::from_slice(&bytes).map_err(|e| {
            warn!("State file {} failed to parse: {}", self.path.display(), e);
            self.corruption(e.to_string())
        })?;

        debug!(
            "Loaded state from {} (status={}, iteration={}, records={})",
            self.path.display(),
            state.status,
            state.iteration,
            state.history.len()
        );
        Ok(state)
    }

    fn save(&self, state: &LoopState) -> Result<()> {
        let mut buf = serde_json::to_string_pretty(state)?;
        buf.push('\n');
        write_atomic(&self.path, buf.as_bytes())?;
        debug!(
            "Saved state to {} (status={}, iteration={})",
            self.path.display(),
            state.status,
            state.iteration
        );
        Ok(())
    }
}
