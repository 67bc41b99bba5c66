//! Symlink-safe path containment.
//!
//! Every path a skill package influences -- declared `adds`/`modifies`
//! entries, operator `path_remap` targets, payload files inside the package --
//! goes through [`resolve_within`]: the candidate is canonicalized against the
//! real filesystem (symlinks in any existing component are followed) and the
//! result must lie strictly inside the canonical root.
//!
//! A remap target that escapes is not an error: [`PathResolver`] logs it and
//! falls back to the declared path, which is then held to the same check.
//! For project paths the `.nanoclaw/` and `.git/` directories are outside
//! too, so a package can touch neither the snapshot baselines nor git.

use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};

use nanoclaw_types::error::SandboxError;
use nanoclaw_types::state::is_reserved_dir;

/// Canonicalize `path`, tolerating components that do not exist yet.
///
/// Walks the path one component at a time. Each component that exists on disk
/// (including a symlink) is resolved with [`std::fs::canonicalize`]; a missing
/// component is appended verbatim and `..` pops the already-resolved prefix.
/// Because the prefix is canonical at every step, `..` never walks back
/// through a symlink. A dangling symlink fails with `NotFound`.
///
/// `path` should be absolute; a relative path is resolved against the
/// process working directory by the first existing component.
pub fn canonicalize_lenient(path: &Path) -> io::Result<PathBuf> {
    let mut resolved = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => resolved.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(name) => {
                resolved.push(name);
                match std::fs::symlink_metadata(&resolved) {
                    Ok(_) => resolved = std::fs::canonicalize(&resolved)?,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e),
                }
            }
        }
    }

    Ok(resolved)
}

/// Resolve `relative` under the canonical `root`, or `None` if it escapes.
///
/// `root` must already be canonical. The root itself does not count as
/// "inside": a file cannot be written there.
pub fn resolve_within(root: &Path, relative: &Path) -> Option<PathBuf> {
    match try_resolve_within(root, relative) {
        Ok(resolved) => resolved,
        Err(e) => {
            tracing::debug!(path = %relative.display(), error = %e, "path cannot be canonicalized");
            None
        }
    }
}

/// Like [`resolve_within`], but keeps filesystem errors apart from escapes.
///
/// A dangling symlink counts as an escape (`Ok(None)`): its target is
/// unknown. Any other failure, such as a regular file used as a directory,
/// is returned as the error.
pub fn try_resolve_within(root: &Path, relative: &Path) -> io::Result<Option<PathBuf>> {
    let candidate = match canonicalize_lenient(&root.join(relative)) {
        Ok(candidate) => candidate,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    Ok((candidate != root && candidate.starts_with(root)).then_some(candidate))
}

/// Whether canonical `path` lies in one of the project's reserved directories.
fn is_reserved(root: &Path, path: &Path) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };
    match relative.components().next() {
        Some(Component::Normal(first)) => first.to_str().is_some_and(is_reserved_dir),
        _ => false,
    }
}

/// The on-disk target for a declared path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// The path as written in the manifest.
    pub declared: String,
    /// Canonical absolute path to write.
    pub absolute: PathBuf,
    /// `absolute` relative to the canonical project root.
    pub relative: PathBuf,
    /// Whether a `path_remap` entry was honored.
    pub remapped: bool,
}

impl ResolvedPath {
    /// `/`-separated project-relative key used for snapshots and the ledger.
    pub fn key(&self) -> String {
        self.relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Resolves manifest paths to contained on-disk targets.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    remap: BTreeMap<String, String>,
}

impl PathResolver {
    /// Create a resolver for `project_root` with the project's remap table.
    pub fn new(project_root: &Path, remap: BTreeMap<String, String>) -> Result<Self, SandboxError> {
        let root = std::fs::canonicalize(project_root).map_err(|e| SandboxError::Root {
            path: project_root.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { root, remap })
    }

    /// The canonical project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a declared path, honoring `path_remap` only when it stays inside.
    ///
    /// The engine and version-control directories (`.nanoclaw/`, `.git/`)
    /// count as outside, whichever way a path reaches them.
    pub fn resolve(&self, declared: &str) -> Result<ResolvedPath, SandboxError> {
        if let Some(target) = self.remap.get(declared) {
            match self.contain(Path::new(target)) {
                Ok(Some(absolute)) => return Ok(self.resolved(declared, absolute, true)),
                Ok(None) => {
                    tracing::warn!(
                        path = %declared,
                        remap = %target,
                        "path_remap target escapes the project root; using the default path"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        path = %declared,
                        remap = %target,
                        error = %e,
                        "path_remap target cannot be resolved; using the default path"
                    );
                }
            }
        }

        match self.contain(Path::new(declared)) {
            Ok(Some(absolute)) => Ok(self.resolved(declared, absolute, false)),
            Ok(None) => Err(SandboxError::Escapes(declared.to_owned())),
            Err(e) => Err(SandboxError::Blocked {
                path: declared.to_owned(),
                reason: e.to_string(),
            }),
        }
    }

    fn contain(&self, relative: &Path) -> io::Result<Option<PathBuf>> {
        Ok(try_resolve_within(&self.root, relative)?
            .filter(|absolute| !is_reserved(&self.root, absolute)))
    }

    fn resolved(&self, declared: &str, absolute: PathBuf, remapped: bool) -> ResolvedPath {
        let relative = absolute
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_default();
        ResolvedPath {
            declared: declared.to_owned(),
            absolute,
            relative,
            remapped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical_tempdir() -> (tempfile::TempDir, PathBuf) {
        let tmpdir = tempfile::tempdir().unwrap();
        let root = std::fs::canonicalize(tmpdir.path()).unwrap();
        (tmpdir, root)
    }

    fn remap(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn missing_components_are_appended() {
        let (_tmp, root) = canonical_tempdir();
        let resolved = canonicalize_lenient(&root.join("src/new/file.ts")).unwrap();
        assert_eq!(resolved, root.join("src").join("new").join("file.ts"));
    }

    #[test]
    fn parent_segments_in_missing_tail_are_applied() {
        let (_tmp, root) = canonical_tempdir();
        let resolved = canonicalize_lenient(&root.join("a/b/../c.ts")).unwrap();
        assert_eq!(resolved, root.join("a").join("c.ts"));
    }

    #[test]
    fn plain_path_resolves_inside_root() {
        let (_tmp, root) = canonical_tempdir();
        let resolver = PathResolver::new(&root, BTreeMap::new()).unwrap();
        let resolved = resolver.resolve("src/newfile.ts").unwrap();
        assert_eq!(resolved.absolute, root.join("src").join("newfile.ts"));
        assert_eq!(resolved.key(), "src/newfile.ts");
        assert!(!resolved.remapped);
    }

    #[test]
    fn in_root_remap_is_honored() {
        let (_tmp, root) = canonical_tempdir();
        let resolver =
            PathResolver::new(&root, remap(&[("src/newfile.ts", "lib/renamed.ts")])).unwrap();
        let resolved = resolver.resolve("src/newfile.ts").unwrap();
        assert_eq!(resolved.absolute, root.join("lib").join("renamed.ts"));
        assert_eq!(resolved.key(), "lib/renamed.ts");
        assert!(resolved.remapped);
    }

    #[test]
    fn parent_segment_remap_falls_back_to_default() {
        let (_tmp, root) = canonical_tempdir();
        let resolver =
            PathResolver::new(&root, remap(&[("src/newfile.ts", "../../outside.txt")])).unwrap();
        let resolved = resolver.resolve("src/newfile.ts").unwrap();
        assert_eq!(resolved.absolute, root.join("src").join("newfile.ts"));
        assert!(!resolved.remapped);
    }

    #[test]
    fn missing_dir_then_parent_cannot_escape() {
        let (_tmp, root) = canonical_tempdir();
        assert!(resolve_within(&root, Path::new("nope/../../outside.txt")).is_none());
    }

    #[test]
    fn absolute_remap_outside_falls_back() {
        let (_tmp, root) = canonical_tempdir();
        let resolver =
            PathResolver::new(&root, remap(&[("src/a.ts", "/tmp/elsewhere.ts")])).unwrap();
        let resolved = resolver.resolve("src/a.ts").unwrap();
        assert_eq!(resolved.absolute, root.join("src").join("a.ts"));
    }

    #[test]
    fn root_itself_is_not_inside() {
        let (_tmp, root) = canonical_tempdir();
        assert!(resolve_within(&root, Path::new(".")).is_none());
        assert!(resolve_within(&root, Path::new("a/..")).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_remap_target_falls_back() {
        let (_tmp, root) = canonical_tempdir();
        let (_outside_tmp, outside) = canonical_tempdir();
        std::os::unix::fs::symlink(&outside, root.join("link-out")).unwrap();

        let resolver =
            PathResolver::new(&root, remap(&[("src/newfile.ts", "link-out/pwned.txt")])).unwrap();
        let resolved = resolver.resolve("src/newfile.ts").unwrap();
        assert_eq!(resolved.absolute, root.join("src").join("newfile.ts"));
        assert!(!resolved.remapped);
    }

    #[cfg(unix)]
    #[test]
    fn parent_after_missing_dir_still_checks_symlinks() {
        let (_tmp, root) = canonical_tempdir();
        let (_outside_tmp, outside) = canonical_tempdir();
        std::os::unix::fs::symlink(&outside, root.join("link-out")).unwrap();

        assert!(resolve_within(&root, Path::new("nope/../link-out/pwned.txt")).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_inside_root_is_followed() {
        let (_tmp, root) = canonical_tempdir();
        std::fs::create_dir(root.join("real")).unwrap();
        std::os::unix::fs::symlink(root.join("real"), root.join("alias")).unwrap();

        let resolved = resolve_within(&root, Path::new("alias/file.ts")).unwrap();
        assert_eq!(resolved, root.join("real").join("file.ts"));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_is_an_escape() {
        let (_tmp, root) = canonical_tempdir();
        std::os::unix::fs::symlink("/nonexistent/target", root.join("dangling")).unwrap();
        assert!(resolve_within(&root, Path::new("dangling")).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn default_path_through_escaping_symlink_is_error() {
        let (_tmp, root) = canonical_tempdir();
        let (_outside_tmp, outside) = canonical_tempdir();
        std::os::unix::fs::symlink(&outside, root.join("src")).unwrap();

        let resolver = PathResolver::new(&root, BTreeMap::new()).unwrap();
        let err = resolver.resolve("src/newfile.ts").unwrap_err();
        assert!(matches!(err, SandboxError::Escapes(ref p) if p == "src/newfile.ts"));
    }

    #[test]
    fn remap_into_reserved_dirs_falls_back() {
        let (_tmp, root) = canonical_tempdir();
        std::fs::create_dir_all(root.join(".nanoclaw/base/src")).unwrap();
        let resolver = PathResolver::new(
            &root,
            remap(&[
                ("src/index.ts", ".nanoclaw/base/src/index.ts"),
                ("src/hook.sh", ".git/hooks/post-commit"),
            ]),
        )
        .unwrap();

        let resolved = resolver.resolve("src/index.ts").unwrap();
        assert_eq!(resolved.absolute, root.join("src").join("index.ts"));
        assert!(!resolved.remapped);

        let resolved = resolver.resolve("src/hook.sh").unwrap();
        assert_eq!(resolved.key(), "src/hook.sh");
    }

    #[test]
    fn default_path_into_reserved_dirs_is_error() {
        let (_tmp, root) = canonical_tempdir();
        let resolver = PathResolver::new(&root, BTreeMap::new()).unwrap();

        for declared in [".nanoclaw/base/src/index.ts", ".git/hooks/post-commit", "./.git/config"] {
            let err = resolver.resolve(declared).unwrap_err();
            assert!(matches!(err, SandboxError::Escapes(_)), "{declared}: {err}");
        }
        // Only the top-level directory is reserved.
        assert!(resolver.resolve("docs/.git/notes.md").is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_into_reserved_dir_is_error() {
        let (_tmp, root) = canonical_tempdir();
        std::fs::create_dir_all(root.join(".nanoclaw/base")).unwrap();
        std::os::unix::fs::symlink(root.join(".nanoclaw/base"), root.join("baseline")).unwrap();

        let resolver = PathResolver::new(&root, BTreeMap::new()).unwrap();
        let err = resolver.resolve("baseline/src/index.ts").unwrap_err();
        assert!(matches!(err, SandboxError::Escapes(_)));
    }

    #[test]
    fn path_through_regular_file_is_blocked_not_escape() {
        let (_tmp, root) = canonical_tempdir();
        std::fs::write(root.join("README.md"), "# project\n").unwrap();

        let resolver = PathResolver::new(&root, BTreeMap::new()).unwrap();
        let err = resolver.resolve("README.md/x").unwrap_err();
        assert!(matches!(err, SandboxError::Blocked { ref path, .. } if path == "README.md/x"));
    }

    #[test]
    fn remap_through_regular_file_falls_back() {
        let (_tmp, root) = canonical_tempdir();
        std::fs::write(root.join("README.md"), "# project\n").unwrap();

        let resolver =
            PathResolver::new(&root, remap(&[("src/a.ts", "README.md/a.ts")])).unwrap();
        let resolved = resolver.resolve("src/a.ts").unwrap();
        assert_eq!(resolved.key(), "src/a.ts");
    }
}
