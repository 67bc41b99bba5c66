//! Engine configuration types.
//!
//! `EngineConfig` represents the optional `.nanoclaw/config.toml` of a
//! project. Every field has a default so the file may be absent.

use serde::{Deserialize, Serialize};

/// Tunables for applying skills to one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Kill a `post_apply` command after this many seconds.
    ///
    /// `None` waits indefinitely, so a hung command blocks the apply.
    #[serde(default)]
    pub hook_timeout_secs: Option<u64>,

    /// Shell used to run `post_apply` commands (invoked as `<shell> -c <cmd>`).
    #[serde(default = "default_shell")]
    pub shell: String,
}

fn default_shell() -> String {
    "sh".to_owned()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hook_timeout_secs: None,
            shell: default_shell(),
        }
    }
}
