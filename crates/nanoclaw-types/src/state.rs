//! Per-project skills state.
//!
//! `ProjectState` is the `.nanoclaw/state.yaml` document: the ledger of
//! applied skills plus the operator-supplied `path_remap` table. It is
//! rewritten once per successful apply and read at the start of every apply.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::skill::SKILLS_SYSTEM_VERSION;

/// Engine-private directory at the project root.
pub const NANOCLAW_DIR: &str = ".nanoclaw";

/// Version-control metadata directory at the project root.
pub const GIT_DIR: &str = ".git";

/// Top-level directories a skill package may never write into.
pub const RESERVED_DIRS: [&str; 2] = [NANOCLAW_DIR, GIT_DIR];

/// Whether `name` (a first path component) is one of [`RESERVED_DIRS`].
///
/// Compared case-insensitively so `.GIT` is caught on case-folding
/// filesystems.
pub fn is_reserved_dir(name: &str) -> bool {
    RESERVED_DIRS.iter().any(|d| d.eq_ignore_ascii_case(name))
}

/// State document inside [`NANOCLAW_DIR`].
pub const STATE_FILE: &str = "state.yaml";

/// Snapshot tree inside [`NANOCLAW_DIR`].
pub const BASE_DIR: &str = "base";

/// Engine configuration inside [`NANOCLAW_DIR`].
pub const CONFIG_FILE: &str = "config.toml";

/// `{root}/.nanoclaw/`
pub fn nanoclaw_dir(project_root: &Path) -> PathBuf {
    project_root.join(NANOCLAW_DIR)
}

/// `{root}/.nanoclaw/state.yaml`
pub fn state_path(project_root: &Path) -> PathBuf {
    nanoclaw_dir(project_root).join(STATE_FILE)
}

/// `{root}/.nanoclaw/base/`
pub fn base_dir(project_root: &Path) -> PathBuf {
    nanoclaw_dir(project_root).join(BASE_DIR)
}

/// `{root}/.nanoclaw/config.toml`
pub fn config_path(project_root: &Path) -> PathBuf {
    nanoclaw_dir(project_root).join(CONFIG_FILE)
}

/// One entry in the applied-skill ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedSkill {
    pub name: String,
    pub version: semver::Version,
    pub applied_at: DateTime<Utc>,
    /// SHA-256 of every file the skill wrote, keyed by project-relative path.
    #[serde(default)]
    pub file_hashes: BTreeMap<String, String>,
}

/// The persisted skills state of one project.
///
/// Unknown top-level fields are carried through `extra` so that rewriting the
/// ledger never drops data written by other tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    #[serde(default = "default_skills_system_version")]
    pub skills_system_version: String,
    #[serde(default)]
    pub core_version: Option<String>,
    #[serde(default)]
    pub applied_skills: Vec<AppliedSkill>,
    /// Project-relative path -> alternate project-relative path.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub path_remap: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml_ng::Value>,
}

fn default_skills_system_version() -> String {
    SKILLS_SYSTEM_VERSION.to_owned()
}

impl Default for ProjectState {
    fn default() -> Self {
        Self {
            skills_system_version: default_skills_system_version(),
            core_version: None,
            applied_skills: Vec::new(),
            path_remap: BTreeMap::new(),
            extra: BTreeMap::new(),
        }
    }
}

impl ProjectState {
    /// Ledger entry for `name`, if the skill was ever applied.
    pub fn applied(&self, name: &str) -> Option<&AppliedSkill> {
        self.applied_skills.iter().find(|s| s.name == name)
    }

    /// Whether exactly this skill version is already in the ledger.
    pub fn is_applied(&self, name: &str, version: &semver::Version) -> bool {
        self.applied(name).is_some_and(|s| &s.version == version)
    }

    /// Insert or replace the ledger entry for `entry.name`.
    ///
    /// A replaced entry moves to the end so the ledger stays in apply order.
    pub fn record_applied(&mut self, entry: AppliedSkill) {
        self.applied_skills.retain(|s| s.name != entry.name);
        self.applied_skills.push(entry);
    }
}
