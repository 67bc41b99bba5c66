//! Application state for CLI commands.
//!
//! AppState pins the project root and its engine configuration once per
//! invocation, and builds the concrete applier on demand.

use std::path::{Path, PathBuf};

use nanoclaw_core::skill::state::StateStore;
use nanoclaw_infra::config::load_engine_config;
use nanoclaw_infra::project::resolve_project_root;
use nanoclaw_infra::skill::{LocalSkillApplier, local_applier};
use nanoclaw_types::config::EngineConfig;

/// Per-invocation state shared by all commands.
#[derive(Debug, Clone)]
pub struct AppState {
    pub project_root: PathBuf,
    pub config: EngineConfig,
}

impl AppState {
    /// Resolve the project root and load its `.nanoclaw/config.toml`.
    pub async fn init(project: Option<&Path>) -> anyhow::Result<Self> {
        let project_root = resolve_project_root(project)?;
        let config = load_engine_config(&project_root).await;
        tracing::debug!(root = %project_root.display(), "project resolved");
        Ok(Self {
            project_root,
            config,
        })
    }

    pub fn state_store(&self) -> StateStore {
        StateStore::for_project(&self.project_root)
    }

    pub fn applier(&self) -> LocalSkillApplier {
        local_applier(self.project_root.clone(), &self.config)
    }
}
