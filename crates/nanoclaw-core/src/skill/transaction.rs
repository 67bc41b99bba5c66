//! Checkpoint/rollback port for the project working tree.
//!
//! The [`Transaction`] trait hides the version-control tool; `GitTransaction`
//! in nanoclaw-infra implements it by shelling out to `git`. The
//! [`Checkpoint`] it returns also carries the materializer's journal (files
//! and directories it created, contents it replaced), so rollback of engine
//! writes never depends on the version-control tool alone.

use std::collections::BTreeSet;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use nanoclaw_types::error::TransactionError;

use crate::skill::snapshot::SnapshotStore;

/// Pre-mutation record of the project tree. Lives for one apply only.
#[derive(Debug, Clone, Default)]
pub struct Checkpoint {
    tree: Option<String>,
    preexisting: BTreeSet<PathBuf>,
    created_files: Vec<PathBuf>,
    created_dirs: Vec<PathBuf>,
    replaced_files: Vec<(PathBuf, Vec<u8>)>,
    replaced_snapshots: Vec<(PathBuf, Option<Vec<u8>>)>,
}

impl Checkpoint {
    /// A checkpoint at tree identity `tree` with the given pre-existing
    /// untracked paths (project-relative).
    pub fn new(tree: Option<String>, preexisting: BTreeSet<PathBuf>) -> Self {
        Self {
            tree,
            preexisting,
            ..Self::default()
        }
    }

    /// Version-control identity of the tracked content at apply start.
    pub fn tree(&self) -> Option<&str> {
        self.tree.as_deref()
    }

    /// Untracked paths that existed before the apply began.
    pub fn preexisting(&self) -> &BTreeSet<PathBuf> {
        &self.preexisting
    }

    /// Absolute paths of files the apply created.
    pub fn created_files(&self) -> &[PathBuf] {
        &self.created_files
    }

    /// Absolute paths of directories the apply created, outermost first.
    pub fn created_dirs(&self) -> &[PathBuf] {
        &self.created_dirs
    }

    pub(crate) fn record_created_file(&mut self, path: PathBuf) {
        self.created_files.push(path);
    }

    pub(crate) fn record_created_dir(&mut self, path: PathBuf) {
        self.created_dirs.push(path);
    }

    pub(crate) fn record_replaced_file(&mut self, path: PathBuf, original: Vec<u8>) {
        self.replaced_files.push((path, original));
    }

    pub(crate) fn record_replaced_snapshot(&mut self, relative: PathBuf, previous: Option<Vec<u8>>) {
        self.replaced_snapshots.push((relative, previous));
    }

    /// Undo every write recorded in the journal, newest first.
    ///
    /// Restores replaced files and snapshots, deletes created files, then
    /// removes created directories that are now empty. Returns one message
    /// per step that failed; an empty vector means everything was undone.
    pub fn revert_journal(&self, snapshots: &SnapshotStore) -> Vec<String> {
        let mut failures = Vec::new();

        for (relative, previous) in self.replaced_snapshots.iter().rev() {
            if let Err(e) = snapshots.restore(relative, previous.as_deref()) {
                failures.push(format!("restore snapshot {}: {e}", relative.display()));
            }
        }

        for (path, original) in self.replaced_files.iter().rev() {
            if let Err(e) = std::fs::write(path, original) {
                failures.push(format!("restore {}: {e}", path.display()));
            }
        }

        for path in self.created_files.iter().rev() {
            if let Err(e) = remove_file_if_present(path) {
                failures.push(format!("remove {}: {e}", path.display()));
            }
        }

        for dir in self.created_dirs.iter().rev() {
            match std::fs::remove_dir(dir) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                // Something else put files here; leave them alone.
                Err(e) if dir_has_entries(dir) => {
                    tracing::debug!(dir = %dir.display(), error = %e, "created directory not empty");
                }
                Err(e) => failures.push(format!("remove directory {}: {e}", dir.display())),
            }
        }

        failures
    }
}

/// Remove a file, treating "already gone" as success.
pub fn remove_file_if_present(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn dir_has_entries(dir: &Path) -> bool {
    std::fs::read_dir(dir).is_ok_and(|mut entries| entries.next().is_some())
}

/// Checkpoint/commit/rollback over the project's working tree.
///
/// Implementors include:
/// - `GitTransaction` (nanoclaw-infra; `git stash create` + `git restore`)
pub trait Transaction: Send + Sync {
    /// Record the current tree identity and the set of existing untracked paths.
    fn checkpoint(&self) -> impl Future<Output = Result<Checkpoint, TransactionError>> + Send;

    /// Discard a checkpoint after a successful apply.
    fn commit(
        &self,
        checkpoint: Checkpoint,
    ) -> impl Future<Output = Result<(), TransactionError>> + Send;

    /// Restore tracked content to the checkpoint and delete every path that
    /// did not exist when it was taken.
    fn rollback(
        &self,
        checkpoint: &Checkpoint,
    ) -> impl Future<Output = Result<(), TransactionError>> + Send;
}
