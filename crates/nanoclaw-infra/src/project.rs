//! Project root resolution.

use std::path::{Path, PathBuf};

use anyhow::Context;

/// Environment variable naming the project root when `--project` is absent.
pub const PROJECT_DIR_ENV: &str = "NANOCLAW_PROJECT_DIR";

/// Resolve the project root to an absolute, canonical directory.
///
/// Priority:
/// 1. `explicit` (the `--project` flag)
/// 2. `NANOCLAW_PROJECT_DIR`
/// 3. The current working directory
pub fn resolve_project_root(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    let candidate = match explicit {
        Some(path) => path.to_path_buf(),
        None => match std::env::var_os(PROJECT_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir().context("Failed to read the current directory")?,
        },
    };

    let root = std::fs::canonicalize(&candidate)
        .with_context(|| format!("Project root {} cannot be resolved", candidate.display()))?;
    if !root.is_dir() {
        anyhow::bail!("Project root {} is not a directory", root.display());
    }
    Ok(root)
}
