//! Skill application wiring.
//!
//! Plugs the git checkpoint, shell hooks and SHA-256 hasher into the core
//! [`SkillApplier`] and exposes the library entry points.

pub mod git;
pub mod hooks;

use std::path::{Path, PathBuf};

use nanoclaw_core::skill::apply::SkillApplier;
use nanoclaw_types::config::EngineConfig;
use nanoclaw_types::skill::ApplyResult;

use crate::config::load_engine_config;
use crate::crypto::hash::Sha256ContentHasher;
use crate::project::resolve_project_root;

pub use git::GitTransaction;
pub use hooks::ShellHookRunner;

/// The applier used outside of tests.
pub type LocalSkillApplier = SkillApplier<GitTransaction, ShellHookRunner, Sha256ContentHasher>;

/// Wire the git, shell and SHA-256 adapters for `project_root`.
pub fn local_applier(project_root: PathBuf, config: &EngineConfig) -> LocalSkillApplier {
    SkillApplier::new(
        project_root.clone(),
        GitTransaction::new(project_root),
        ShellHookRunner::from_config(config),
        Sha256ContentHasher::new(),
    )
}

/// Build an applier for `project_root` using its `.nanoclaw/config.toml`.
pub async fn open_applier(project_root: PathBuf) -> LocalSkillApplier {
    let config = load_engine_config(&project_root).await;
    local_applier(project_root, &config)
}

/// Apply the package at `skill_dir` to the project in the current directory
/// (or `NANOCLAW_PROJECT_DIR`).
pub async fn apply_skill(skill_dir: &Path) -> ApplyResult {
    match resolve_project_root(None) {
        Ok(root) => apply_skill_in(root, skill_dir).await,
        Err(err) => ApplyResult::failed(format!("{err:#}")),
    }
}

/// Apply the package at `skill_dir` to the project at `project_root`.
pub async fn apply_skill_in(project_root: PathBuf, skill_dir: &Path) -> ApplyResult {
    open_applier(project_root).await.apply(skill_dir).await
}
