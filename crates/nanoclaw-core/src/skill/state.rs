//! Project state persistence.
//!
//! Reads and atomically rewrites `.nanoclaw/state.yaml`. The new document is
//! written to a temporary file in the same directory, synced, and renamed over
//! the old one, so a crash mid-write leaves either the old or the new state.

use std::io::Write;
use std::path::{Path, PathBuf};

use nanoclaw_types::error::ApplyError;
use nanoclaw_types::state::{ProjectState, state_path};

/// Reader/writer for one project's state document.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Create a store for an explicit state file path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// The store for a project: `{root}/.nanoclaw/state.yaml`.
    pub fn for_project(project_root: &Path) -> Self {
        Self::new(state_path(project_root))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state; a missing file is an empty ledger.
    pub fn load(&self) -> Result<ProjectState, ApplyError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no state file, starting empty");
                return Ok(ProjectState::default());
            }
            Err(e) => return Err(ApplyError::io(self.path.display(), &e)),
        };

        serde_yaml_ng::from_str(&content).map_err(|e| {
            ApplyError::State(format!("failed to parse {}: {e}", self.path.display()))
        })
    }

    /// Atomically replace the state file with `state`.
    pub fn save(&self, state: &ProjectState) -> Result<(), ApplyError> {
        let state_err = |what: &str, e: &dyn std::fmt::Display| {
            ApplyError::State(format!("failed to {what} {}: {e}", self.path.display()))
        };

        let content = serde_yaml_ng::to_string(state).map_err(|e| state_err("serialize", &e))?;

        let dir = self
            .path
            .parent()
            .ok_or_else(|| ApplyError::State(format!("{} has no parent", self.path.display())))?;
        std::fs::create_dir_all(dir).map_err(|e| state_err("create directory for", &e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| state_err("stage", &e))?;
        tmp.write_all(content.as_bytes())
            .map_err(|e| state_err("write", &e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| state_err("sync", &e))?;
        tmp.persist(&self.path)
            .map_err(|e| state_err("replace", &e.error))?;

        Ok(())
    }
}
