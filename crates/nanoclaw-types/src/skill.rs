//! Skill package domain types.
//!
//! A skill package is a directory holding a `manifest.yaml` plus payload
//! files. The manifest declares which project files the skill adds or
//! modifies and which commands run once the files are in place.

use serde::{Deserialize, Serialize};

/// Version of the skills engine itself.
///
/// Packages declare `min_skills_system_version`; anything newer than this is
/// rejected before the project is touched.
pub const SKILLS_SYSTEM_VERSION: &str = "0.1.0";

/// File name of the manifest inside a skill package directory.
pub const MANIFEST_FILE: &str = "manifest.yaml";

/// Package subdirectory holding payloads for `adds` entries.
pub const ADD_DIR: &str = "add";

/// Package subdirectory holding payloads for `modifies` entries.
pub const MODIFY_DIR: &str = "modify";

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// Parsed `manifest.yaml` of a skill package.
///
/// Read-only to the engine: packages are produced elsewhere and never
/// rewritten during an apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillManifest {
    /// Skill name, the ledger key.
    pub skill: String,
    /// Semantic version of this package.
    pub version: String,
    /// Semantic version of the host project the package was built against.
    pub core_version: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Lowest skills engine version able to apply this package.
    #[serde(default)]
    pub min_skills_system_version: Option<String>,
    /// Project-relative paths the package creates.
    #[serde(default)]
    pub adds: Vec<String>,
    /// Project-relative paths the package rewrites.
    #[serde(default)]
    pub modifies: Vec<String>,
    /// Shell commands run in the project root after materialization.
    #[serde(default)]
    pub post_apply: Vec<String>,
    /// Skills that must already be applied.
    #[serde(default)]
    pub depends: Vec<String>,
    /// Skills that must not be applied.
    #[serde(default)]
    pub conflicts: Vec<String>,
}

impl SkillManifest {
    /// Every project-relative path the package declares, adds first.
    pub fn declared_paths(&self) -> impl Iterator<Item = &str> {
        self.adds
            .iter()
            .chain(self.modifies.iter())
            .map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Apply result
// ---------------------------------------------------------------------------

/// Result record returned across the engine boundary.
///
/// Errors are reported, never thrown: a failed apply yields
/// `success = false` and a human-readable `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApplyResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST_YAML: &str = r#"
skill: add-feishu
version: 1.2.0
core_version: 1.0.0
min_skills_system_version: 0.1.0
adds:
  - src/channels/feishu.ts
modifies:
  - src/index.ts
post_apply:
  - npm install
"#;

    #[test]
    fn manifest_deserializes_with_defaults() {
        let manifest: SkillManifest = serde_yaml_ng::from_str(
            "skill: tiny\nversion: 0.1.0\ncore_version: 1.0.0\n",
        )
        .unwrap();
        assert_eq!(manifest.skill, "tiny");
        assert!(manifest.adds.is_empty());
        assert!(manifest.modifies.is_empty());
        assert!(manifest.post_apply.is_empty());
        assert!(manifest.min_skills_system_version.is_none());
    }

    #[test]
    fn manifest_full_fields() {
        let manifest: SkillManifest = serde_yaml_ng::from_str(MANIFEST_YAML).unwrap();
        assert_eq!(manifest.skill, "add-feishu");
        assert_eq!(manifest.min_skills_system_version.as_deref(), Some("0.1.0"));
        assert_eq!(manifest.post_apply, vec!["npm install".to_owned()]);

        let paths: Vec<_> = manifest.declared_paths().collect();
        assert_eq!(paths, vec!["src/channels/feishu.ts", "src/index.ts"]);
    }

    #[test]
    fn manifest_rejects_non_sequence_adds() {
        let result: Result<SkillManifest, _> = serde_yaml_ng::from_str(
            "skill: bad\nversion: 1.0.0\ncore_version: 1.0.0\nadds: src/x.ts\n",
        );
        assert!(result.is_err());
    }

    #[test]
    fn apply_result_json_omits_missing_error() {
        let json = serde_json::to_string(&ApplyResult::ok()).unwrap();
        assert_eq!(json, r#"{"success":true}"#);

        let failed = ApplyResult::failed("boom");
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("boom"));
    }
}
