//! Base snapshot store.
//!
//! Keeps the last content the engine wrote for every path a skill has
//! modified, under `.nanoclaw/base/` mirroring the project layout. A live file
//! that no longer matches its snapshot was edited by hand since the last
//! apply, and overwriting it would lose those edits.

use std::io;
use std::path::{Path, PathBuf};

use nanoclaw_types::state::base_dir;

/// Filesystem-backed snapshot store.
///
/// Layout:
/// ```text
/// {project}/.nanoclaw/base/
///   src/index.ts        <- last engine-written content of {project}/src/index.ts
/// ```
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    base_dir: PathBuf,
}

impl SnapshotStore {
    /// Create a store rooted at an explicit directory.
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// The store for a project: `{root}/.nanoclaw/base/`.
    pub fn for_project(project_root: &Path) -> Self {
        Self::new(base_dir(project_root))
    }

    /// Path of the snapshot for a project-relative path.
    pub fn snapshot_path(&self, relative: &Path) -> PathBuf {
        self.base_dir.join(relative)
    }

    /// Stored content for `relative`, or `None` if it was never snapshotted.
    pub fn read(&self, relative: &Path) -> io::Result<Option<Vec<u8>>> {
        match std::fs::read(self.snapshot_path(relative)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Store `content` for `relative`, returning what was stored before.
    pub fn write(&self, relative: &Path, content: &[u8]) -> io::Result<Option<Vec<u8>>> {
        let previous = self.read(relative)?;
        let path = self.snapshot_path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(previous)
    }

    /// Undo a [`write`](Self::write): put back `previous`, or remove the
    /// snapshot if there was none.
    pub fn restore(&self, relative: &Path, previous: Option<&[u8]>) -> io::Result<()> {
        let path = self.snapshot_path(relative);
        match previous {
            Some(content) => std::fs::write(&path, content),
            None => match std::fs::remove_file(&path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
                _ => Ok(()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_missing_snapshot_is_none() {
        let tmpdir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::for_project(tmpdir.path());
        assert_eq!(store.read(Path::new("src/index.ts")).unwrap(), None);
    }

    #[test]
    fn write_creates_parents_and_returns_previous() {
        let tmpdir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::for_project(tmpdir.path());
        let rel = Path::new("src/deep/index.ts");

        assert_eq!(store.write(rel, b"v1").unwrap(), None);
        assert_eq!(store.write(rel, b"v2").unwrap(), Some(b"v1".to_vec()));
        assert_eq!(store.read(rel).unwrap(), Some(b"v2".to_vec()));
        assert!(
            tmpdir
                .path()
                .join(".nanoclaw/base/src/deep/index.ts")
                .exists()
        );
    }

    #[test]
    fn restore_undoes_writes() {
        let tmpdir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::for_project(tmpdir.path());
        let rel = Path::new("src/index.ts");

        let previous = store.write(rel, b"first").unwrap();
        assert!(previous.is_none());
        store.restore(rel, previous.as_deref()).unwrap();
        assert_eq!(store.read(rel).unwrap(), None);

        store.write(rel, b"first").unwrap();
        let previous = store.write(rel, b"second").unwrap();
        store.restore(rel, previous.as_deref()).unwrap();
        assert_eq!(store.read(rel).unwrap(), Some(b"first".to_vec()));
    }

    #[test]
    fn restore_missing_snapshot_is_noop() {
        let tmpdir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::for_project(tmpdir.path());
        store.restore(Path::new("never/written.ts"), None).unwrap();
    }
}
