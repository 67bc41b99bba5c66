//! File materialization: the writes of an apply.
//!
//! Runs strictly inside a checkpoint. Every write is journaled on the
//! [`Checkpoint`] before or as it happens, so a failure at any point can be
//! undone completely.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use nanoclaw_types::error::ApplyError;
use nanoclaw_types::skill::{ADD_DIR, MODIFY_DIR, SkillManifest};

use crate::service::hash::ContentHasher;
use crate::skill::sandbox::{PathResolver, ResolvedPath, resolve_within};
use crate::skill::snapshot::SnapshotStore;
use crate::skill::transaction::Checkpoint;

/// What a materialization pass wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    /// Hash of every written file, keyed by project-relative path.
    pub file_hashes: BTreeMap<String, String>,
    /// Project-relative paths of files that did not exist before.
    pub added: Vec<String>,
    /// Project-relative paths of files that were rewritten.
    pub modified: Vec<String>,
}

/// Writes a package's `adds` and `modifies` into the project.
pub struct Materializer<'a, C: ContentHasher> {
    package_root: PathBuf,
    resolver: &'a PathResolver,
    snapshots: &'a SnapshotStore,
    hasher: &'a C,
}

impl<'a, C: ContentHasher> Materializer<'a, C> {
    pub fn new(
        skill_dir: &Path,
        resolver: &'a PathResolver,
        snapshots: &'a SnapshotStore,
        hasher: &'a C,
    ) -> Result<Self, ApplyError> {
        let package_root =
            std::fs::canonicalize(skill_dir).map_err(|e| ApplyError::io(skill_dir.display(), &e))?;
        Ok(Self {
            package_root,
            resolver,
            snapshots,
            hasher,
        })
    }

    /// Apply every `adds` entry, then every `modifies` entry.
    ///
    /// Aborts on the first failing file; whatever was already written is in
    /// the checkpoint journal.
    pub fn materialize(
        &self,
        manifest: &SkillManifest,
        checkpoint: &mut Checkpoint,
    ) -> Result<MaterializeReport, ApplyError> {
        let mut report = MaterializeReport::default();

        for declared in &manifest.adds {
            let target = self.resolver.resolve(declared)?;
            let content = self.read_payload(ADD_DIR, declared)?;
            self.add_file(&target, &content, checkpoint)?;
            report
                .file_hashes
                .insert(target.key(), self.hasher.compute_hash(&content));
            report.added.push(target.key());
        }

        for declared in &manifest.modifies {
            let target = self.resolver.resolve(declared)?;
            let content = self.read_payload(MODIFY_DIR, declared)?;
            self.modify_file(&target, &content, checkpoint)?;
            report
                .file_hashes
                .insert(target.key(), self.hasher.compute_hash(&content));
            report.modified.push(target.key());
        }

        Ok(report)
    }

    /// Read the payload for `declared` from `{pkg}/{section}/{path}`, falling
    /// back to `{pkg}/{path}`.
    ///
    /// Payload paths get the same containment check as project paths: a
    /// symlink inside the package cannot pull in files from elsewhere.
    fn read_payload(&self, section: &str, declared: &str) -> Result<Vec<u8>, ApplyError> {
        let sectioned = Path::new(section).join(declared);
        let candidates = [sectioned.as_path(), Path::new(declared)];

        for candidate in candidates {
            let Some(path) = resolve_within(&self.package_root, candidate) else {
                continue;
            };
            if path.is_file() {
                return std::fs::read(&path).map_err(|e| ApplyError::io(path.display(), &e));
            }
        }

        Err(ApplyError::ManifestInvalid(format!(
            "package has no payload for '{declared}' (looked in {section}/{declared} and {declared})"
        )))
    }

    fn add_file(
        &self,
        target: &ResolvedPath,
        content: &[u8],
        checkpoint: &mut Checkpoint,
    ) -> Result<(), ApplyError> {
        let path = &target.absolute;

        if std::fs::symlink_metadata(path).is_ok() {
            // A previous apply that crashed before its ledger write leaves
            // exactly this content behind.
            let existing = std::fs::read(path).ok();
            if existing.as_deref() == Some(content) {
                tracing::info!(path = %target.key(), "added file already present with identical content");
                return Ok(());
            }
            return Err(ApplyError::Conflict(format!(
                "cannot add '{}': a file already exists at {}",
                target.declared,
                target.key()
            )));
        }

        self.create_parents(path, checkpoint)?;
        std::fs::write(path, content).map_err(|e| ApplyError::io(path.display(), &e))?;
        checkpoint.record_created_file(path.clone());

        tracing::debug!(path = %target.key(), remapped = target.remapped, "added file");
        Ok(())
    }

    fn modify_file(
        &self,
        target: &ResolvedPath,
        content: &[u8],
        checkpoint: &mut Checkpoint,
    ) -> Result<(), ApplyError> {
        let path = &target.absolute;

        let live = match std::fs::read(path) {
            Ok(live) => live,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ApplyError::Conflict(format!(
                    "cannot modify '{}': {} does not exist",
                    target.declared,
                    target.key()
                )));
            }
            Err(e) => return Err(ApplyError::io(path.display(), &e)),
        };

        let snapshot = self
            .snapshots
            .read(&target.relative)
            .map_err(|e| ApplyError::io(self.snapshots.snapshot_path(&target.relative).display(), &e))?;
        if let Some(base) = snapshot {
            if base != live {
                return Err(ApplyError::Conflict(format!(
                    "{} has local changes since the last skill wrote it",
                    target.key()
                )));
            }
        }

        checkpoint.record_replaced_file(path.clone(), live);
        std::fs::write(path, content).map_err(|e| ApplyError::io(path.display(), &e))?;

        let previous = self
            .snapshots
            .write(&target.relative, content)
            .map_err(|e| ApplyError::io(self.snapshots.snapshot_path(&target.relative).display(), &e))?;
        checkpoint.record_replaced_snapshot(target.relative.clone(), previous);

        tracing::debug!(path = %target.key(), remapped = target.remapped, "modified file");
        Ok(())
    }

    /// `create_dir_all` for the parent of `path`, journaling each directory
    /// that did not exist.
    fn create_parents(&self, path: &Path, checkpoint: &mut Checkpoint) -> Result<(), ApplyError> {
        let Some(parent) = path.parent() else {
            return Ok(());
        };

        let missing: Vec<&Path> = parent
            .ancestors()
            .take_while(|dir| std::fs::symlink_metadata(dir).is_err())
            .collect();

        for dir in missing.into_iter().rev() {
            std::fs::create_dir(dir).map_err(|e| ApplyError::io(dir.display(), &e))?;
            checkpoint.record_created_dir(dir.to_path_buf());
        }
        Ok(())
    }
}
