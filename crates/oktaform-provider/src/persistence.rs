use std::path::PathBuf;

use crate::error::ProvisionerError;
use crate::state::{ProviderState, STATE_VERSION};

/// Local state file, rewritten atomically after every action.
pub struct StatePersistence {
    pub path: PathBuf,
}

impl StatePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Write state to disk (atomic: tmp + rename).
    pub async fn flush(&self, state: &ProviderState) -> Result<(), ProvisionerError> {
        let json = serde_json::to_vec_pretty(state)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &json)?;
        std::fs::rename(&tmp_path, &self.path)?;

        tracing::debug!(path = %self.path.display(), serial = state.serial, "state flushed");
        Ok(())
    }

    /// Load state, or a fresh one when no file exists yet.
    pub async fn load(&self) -> Result<ProviderState, ProvisionerError> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "no existing state found, starting fresh");
            return Ok(ProviderState::default());
        }
        let json = std::fs::read(&self.path)?;
        let state: ProviderState = serde_json::from_slice(&json)?;
        if state.version > STATE_VERSION {
            return Err(ProvisionerError::State(format!(
                "state file version {} is newer than supported version {STATE_VERSION}",
                state.version
            )));
        }
        tracing::debug!(
            path = %self.path.display(),
            resources = state.resources.len(),
            "state loaded"
        );
        Ok(state)
    }
}
