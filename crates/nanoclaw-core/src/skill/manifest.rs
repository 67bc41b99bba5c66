//! Skill package manifest parsing and validation.
//!
//! `manifest.yaml` is parsed in two steps: the version gate is checked on the
//! raw YAML first, so a package written for a newer engine reports the
//! version it needs even when the rest of its manifest uses fields this
//! engine cannot read. The typed [`SkillManifest`] is then validated for
//! shape and path safety.

use std::collections::HashSet;
use std::path::{Component, Path};

use nanoclaw_types::error::ApplyError;
use nanoclaw_types::skill::{MANIFEST_FILE, SkillManifest};
use nanoclaw_types::state::is_reserved_dir;

/// Read and parse `{skill_dir}/manifest.yaml`, enforcing the version gate.
pub fn load_manifest(skill_dir: &Path, engine_version: &str) -> Result<SkillManifest, ApplyError> {
    let manifest_path = skill_dir.join(MANIFEST_FILE);
    let content = std::fs::read_to_string(&manifest_path)
        .map_err(|e| ApplyError::io(manifest_path.display(), &e))?;
    parse_manifest(&content, engine_version)
}

/// Parse manifest YAML, enforcing the version gate before the typed shape.
pub fn parse_manifest(content: &str, engine_version: &str) -> Result<SkillManifest, ApplyError> {
    let raw: serde_yaml_ng::Value = serde_yaml_ng::from_str(content)
        .map_err(|e| ApplyError::ManifestInvalid(format!("manifest is not valid YAML: {e}")))?;

    if let Some(required) = raw.get("min_skills_system_version") {
        let required = yaml_scalar(required).ok_or_else(|| {
            ApplyError::ManifestInvalid("min_skills_system_version must be a version string".to_owned())
        })?;
        check_engine_version(&required, engine_version)?;
    }

    serde_yaml_ng::from_value(raw)
        .map_err(|e| ApplyError::ManifestInvalid(format!("manifest has the wrong shape: {e}")))
}

/// Render a YAML scalar as the string the author wrote.
fn yaml_scalar(value: &serde_yaml_ng::Value) -> Option<String> {
    match value {
        serde_yaml_ng::Value::String(s) => Some(s.clone()),
        serde_yaml_ng::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reject packages whose minimum engine version exceeds `engine_version`.
///
/// Compares semantic versions, not strings: `0.10.0` is newer than `0.9.0`.
/// The error always carries the literal required version.
pub fn check_engine_version(required: &str, engine_version: &str) -> Result<(), ApplyError> {
    let incompatible = || ApplyError::VersionIncompatible {
        required: required.to_owned(),
        current: engine_version.to_owned(),
    };

    let required_version = semver::Version::parse(required.trim()).map_err(|e| {
        ApplyError::ManifestInvalid(format!(
            "min_skills_system_version '{required}' is not a semantic version: {e}"
        ))
    })?;
    let current = semver::Version::parse(engine_version).map_err(|_| incompatible())?;

    if required_version > current {
        return Err(incompatible());
    }
    Ok(())
}

/// Validate a parsed manifest.
///
/// Checks, in order:
/// - `min_skills_system_version` (if present) is not newer than the engine
/// - `skill` is non-empty, `version` and `core_version` are semver
/// - every declared path is relative, non-empty and free of `..`
/// - no path is declared twice
/// - the skill does not depend on or conflict with itself
pub fn validate_manifest(manifest: &SkillManifest, engine_version: &str) -> Result<(), ApplyError> {
    if let Some(ref required) = manifest.min_skills_system_version {
        check_engine_version(required, engine_version)?;
    }

    if manifest.skill.trim().is_empty() {
        return Err(ApplyError::ManifestInvalid("skill name must not be empty".to_owned()));
    }

    parse_semver_field("version", &manifest.version)?;
    parse_semver_field("core_version", &manifest.core_version)?;

    let mut seen = HashSet::new();
    for path in manifest.declared_paths() {
        validate_relative_path(path)?;
        if !seen.insert(path) {
            return Err(ApplyError::ManifestInvalid(format!(
                "path '{path}' is declared more than once"
            )));
        }
    }

    for command in &manifest.post_apply {
        if command.trim().is_empty() {
            return Err(ApplyError::ManifestInvalid(
                "post_apply commands must not be empty".to_owned(),
            ));
        }
    }

    if manifest.depends.iter().any(|d| d == &manifest.skill) {
        return Err(ApplyError::ManifestInvalid(format!(
            "skill '{}' lists itself in depends",
            manifest.skill
        )));
    }
    if manifest.conflicts.iter().any(|c| c == &manifest.skill) {
        return Err(ApplyError::ManifestInvalid(format!(
            "skill '{}' lists itself in conflicts",
            manifest.skill
        )));
    }

    Ok(())
}

/// Parse a semver field, naming the field in the error.
pub fn parse_semver_field(field: &str, value: &str) -> Result<semver::Version, ApplyError> {
    semver::Version::parse(value.trim()).map_err(|e| {
        ApplyError::ManifestInvalid(format!("{field} '{value}' is not a semantic version: {e}"))
    })
}

/// Reject absolute paths, parent segments, empty paths and paths under
/// `.nanoclaw/` or `.git/`.
///
/// Runs regardless of later sandboxing so a malicious manifest is refused
/// before anything is checkpointed.
pub fn validate_relative_path(path: &str) -> Result<(), ApplyError> {
    let invalid = |why: &str| ApplyError::ManifestInvalid(format!("path '{path}' {why}"));

    if path.trim().is_empty() {
        return Err(invalid("is empty"));
    }
    if path.contains('\\') {
        return Err(invalid("must use '/' separators"));
    }
    if path.contains('\0') {
        return Err(invalid("contains a NUL byte"));
    }

    let mut normal_components = 0usize;
    for component in Path::new(path).components() {
        match component {
            Component::Normal(name) if normal_components == 0 => {
                if name.to_str().is_some_and(is_reserved_dir) {
                    return Err(invalid("is inside a directory reserved for the engine or git"));
                }
                normal_components += 1;
            }
            Component::Normal(_) => normal_components += 1,
            Component::CurDir => {}
            Component::ParentDir => return Err(invalid("must not contain '..'")),
            Component::RootDir | Component::Prefix(_) => return Err(invalid("must be relative")),
        }
    }
    if normal_components == 0 {
        return Err(invalid("does not name a file"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENGINE: &str = "0.1.0";

    const FULL_MANIFEST: &str = r#"
skill: add-feishu
version: 1.0.0
core_version: 1.0.0
description: Feishu/Lark channel
min_skills_system_version: 0.1.0
adds:
  - src/channels/feishu.ts
modifies:
  - src/index.ts
post_apply:
  - npm install @larksuiteoapi/node-sdk
depends: []
conflicts:
  - add-lark-legacy
"#;

    fn manifest(adds: &[&str], modifies: &[&str]) -> SkillManifest {
        SkillManifest {
            skill: "test-skill".to_owned(),
            version: "1.0.0".to_owned(),
            core_version: "1.0.0".to_owned(),
            description: None,
            min_skills_system_version: None,
            adds: adds.iter().map(|s| s.to_string()).collect(),
            modifies: modifies.iter().map(|s| s.to_string()).collect(),
            post_apply: Vec::new(),
            depends: Vec::new(),
            conflicts: Vec::new(),
        }
    }

    #[test]
    fn parse_full_manifest() {
        let manifest = parse_manifest(FULL_MANIFEST, ENGINE).unwrap();
        assert_eq!(manifest.skill, "add-feishu");
        assert_eq!(manifest.adds, vec!["src/channels/feishu.ts".to_owned()]);
        assert_eq!(manifest.modifies, vec!["src/index.ts".to_owned()]);
        assert_eq!(manifest.conflicts, vec!["add-lark-legacy".to_owned()]);
        validate_manifest(&manifest, ENGINE).unwrap();
    }

    #[test]
    fn version_gate_reports_required_version() {
        let content = "skill: future\nversion: 1.0.0\ncore_version: 1.0.0\nmin_skills_system_version: 99.0.0\n";
        let err = parse_manifest(content, ENGINE).unwrap_err();
        assert!(matches!(err, ApplyError::VersionIncompatible { .. }));
        assert!(err.to_string().contains("99.0.0"));
    }

    #[test]
    fn version_gate_runs_before_shape_check() {
        // `adds` is malformed, but the version requirement is what gets reported.
        let content = "skill: future\nversion: 1.0.0\ncore_version: 1.0.0\nmin_skills_system_version: 2.0.0\nadds: 42\n";
        let err = parse_manifest(content, ENGINE).unwrap_err();
        assert!(err.to_string().contains("2.0.0"));
    }

    #[test]
    fn version_gate_uses_semver_ordering() {
        // String comparison would call "0.9.0" newer than "0.10.0".
        assert!(check_engine_version("0.9.0", "0.10.0").is_ok());
        assert!(check_engine_version("0.10.0", "0.9.0").is_err());
        assert!(check_engine_version("0.1.0", "0.1.0").is_ok());
    }

    #[test]
    fn malformed_min_version_is_invalid_manifest() {
        let err = check_engine_version("soon", ENGINE).unwrap_err();
        assert!(matches!(err, ApplyError::ManifestInvalid(_)));
    }

    #[test]
    fn non_sequence_adds_rejected() {
        let content = "skill: bad\nversion: 1.0.0\ncore_version: 1.0.0\nadds: src/x.ts\n";
        let err = parse_manifest(content, ENGINE).unwrap_err();
        assert!(matches!(err, ApplyError::ManifestInvalid(_)));
        assert!(err.to_string().contains("wrong shape"));
    }

    #[test]
    fn reject_parent_segments() {
        let err = validate_manifest(&manifest(&["../outside.ts"], &[]), ENGINE).unwrap_err();
        assert!(err.to_string().contains("must not contain '..'"));

        let err = validate_manifest(&manifest(&[], &["src/../../etc/passwd"]), ENGINE).unwrap_err();
        assert!(matches!(err, ApplyError::ManifestInvalid(_)));
    }

    #[test]
    fn reject_absolute_paths() {
        let err = validate_manifest(&manifest(&["/etc/passwd"], &[]), ENGINE).unwrap_err();
        assert!(err.to_string().contains("must be relative"));
    }

    #[test]
    fn reject_empty_and_dot_paths() {
        assert!(validate_relative_path("").is_err());
        assert!(validate_relative_path(".").is_err());
        assert!(validate_relative_path("./").is_err());
        assert!(validate_relative_path("./src/a.ts").is_ok());
    }

    #[test]
    fn reject_reserved_directories() {
        let err = validate_manifest(
            &manifest(&[".git/hooks/post-commit"], &[".nanoclaw/base/src/index.ts"]),
            ENGINE,
        )
        .unwrap_err();
        assert!(matches!(err, ApplyError::ManifestInvalid(_)));
        assert!(err.to_string().contains(".git/hooks/post-commit"));

        assert!(validate_relative_path("./.nanoclaw/state.yaml").is_err());
        assert!(validate_relative_path(".Git/config").is_err());
        assert!(validate_relative_path(".github/workflows/ci.yml").is_ok());
        assert!(validate_relative_path("docs/.nanoclaw").is_ok());
    }

    #[test]
    fn reject_backslash_paths() {
        assert!(validate_relative_path("src\\..\\x").is_err());
    }

    #[test]
    fn reject_duplicate_paths() {
        let err = validate_manifest(&manifest(&["src/a.ts"], &["src/a.ts"]), ENGINE).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn reject_invalid_semver_version() {
        let mut m = manifest(&[], &[]);
        m.version = "latest".to_owned();
        let err = validate_manifest(&m, ENGINE).unwrap_err();
        assert!(err.to_string().contains("version 'latest'"));
    }

    #[test]
    fn reject_self_dependency() {
        let mut m = manifest(&[], &[]);
        m.depends = vec!["test-skill".to_owned()];
        let err = validate_manifest(&m, ENGINE).unwrap_err();
        assert!(err.to_string().contains("lists itself in depends"));
    }

    #[test]
    fn empty_sections_are_valid() {
        validate_manifest(&manifest(&[], &[]), ENGINE).unwrap();
    }

    #[test]
    fn load_manifest_missing_file_is_io_error() {
        let tmpdir = tempfile::tempdir().unwrap();
        let err = load_manifest(tmpdir.path(), ENGINE).unwrap_err();
        assert!(matches!(err, ApplyError::Io { .. }));
    }
}
