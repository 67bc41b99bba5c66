//! Git-backed [`Transaction`] for the project working tree.
//!
//! A checkpoint is a dangling commit from `git stash create` (or `HEAD` when
//! the tree is clean) plus the list of untracked files that already existed.
//! Rollback restores tracked content from that commit and deletes every
//! untracked file that is not on the list. The index, `HEAD` and the stash
//! list are never touched.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use nanoclaw_core::skill::transaction::{Checkpoint, Transaction, remove_file_if_present};
use nanoclaw_types::error::TransactionError;

/// Checkpoints the work tree rooted at `root` by shelling out to `git`.
#[derive(Debug, Clone)]
pub struct GitTransaction {
    root: PathBuf,
}

impl GitTransaction {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run `git <args>` in the project root and return its stdout.
    async fn git(&self, args: &[&str]) -> Result<String, TransactionError> {
        let command = format!("git {}", args.join(" "));
        let output = tokio::process::Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| TransactionError::Spawn {
                command: command.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(TransactionError::Command {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Untracked, non-ignored files under the root, relative to it.
    async fn untracked_files(&self) -> Result<BTreeSet<PathBuf>, TransactionError> {
        let listing = self
            .git(&["ls-files", "--others", "--exclude-standard", "-z"])
            .await?;
        Ok(listing
            .split('\0')
            .filter(|entry| !entry.is_empty())
            .map(PathBuf::from)
            .collect())
    }

    /// Commit id capturing tracked content, or `None` on an unborn branch.
    async fn snapshot_tree(&self) -> Result<Option<String>, TransactionError> {
        if self.git(&["rev-parse", "--verify", "--quiet", "HEAD"]).await.is_err() {
            tracing::debug!(root = %self.root.display(), "no commits yet, tracked content not checkpointed");
            return Ok(None);
        }

        let stash = self.git(&["stash", "create"]).await?;
        let id = match stash.trim() {
            // Clean tree: nothing to stash, HEAD is the state.
            "" => self.git(&["rev-parse", "HEAD"]).await?.trim().to_owned(),
            id => id.to_owned(),
        };
        Ok(Some(id))
    }
}

impl Transaction for GitTransaction {
    async fn checkpoint(&self) -> Result<Checkpoint, TransactionError> {
        let inside = self.git(&["rev-parse", "--is-inside-work-tree"]).await;
        if !matches!(inside.as_deref().map(str::trim), Ok("true")) {
            return Err(TransactionError::NotAWorkTree(self.root.display().to_string()));
        }

        let tree = self.snapshot_tree().await?;
        let preexisting = self.untracked_files().await?;
        tracing::debug!(
            tree = tree.as_deref().unwrap_or("<unborn>"),
            untracked = preexisting.len(),
            "checkpoint taken"
        );
        Ok(Checkpoint::new(tree, preexisting))
    }

    async fn commit(&self, checkpoint: Checkpoint) -> Result<(), TransactionError> {
        // `stash create` never touched refs, so there is nothing to clean up.
        tracing::debug!(tree = checkpoint.tree().unwrap_or("<unborn>"), "checkpoint released");
        Ok(())
    }

    async fn rollback(&self, checkpoint: &Checkpoint) -> Result<(), TransactionError> {
        let mut failures = Vec::new();

        if let Some(tree) = checkpoint.tree() {
            if let Err(e) = self
                .git(&["restore", "--source", tree, "--worktree", "--", "."])
                .await
            {
                failures.push(e.to_string());
            }
        }

        match self.untracked_files().await {
            Ok(now) => {
                for path in now.difference(checkpoint.preexisting()) {
                    let absolute = self.root.join(path);
                    tracing::debug!(path = %path.display(), "removing file created during apply");
                    if let Err(e) = remove_file_if_present(&absolute) {
                        failures.push(format!("remove {}: {e}", absolute.display()));
                    }
                }
            }
            Err(e) => failures.push(e.to_string()),
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(TransactionError::Incomplete(failures))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Run git synchronously in `dir`, panicking on failure.
    pub(crate) fn git(dir: &Path, args: &[&str]) {
        let status = std::process::Command::new("git")
            .args(args)
            .current_dir(dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?} failed");
    }

    /// A fresh repository with one commit containing `README.md`.
    pub(crate) fn init_repo(dir: &Path) {
        git(dir, &["init", "-q"]);
        git(dir, &["config", "user.email", "test@example.com"]);
        git(dir, &["config", "user.name", "Test"]);
        git(dir, &["config", "commit.gpgsign", "false"]);
        std::fs::write(dir.join("README.md"), "# project\n").unwrap();
        git(dir, &["add", "."]);
        git(dir, &["commit", "-q", "-m", "init"]);
    }

    #[tokio::test]
    async fn rollback_restores_tracked_and_removes_new_untracked() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());
        std::fs::write(tmp.path().join("notes.txt"), "mine").unwrap();

        let tx = GitTransaction::new(tmp.path().to_path_buf());
        let cp = tx.checkpoint().await.unwrap();
        assert!(cp.tree().is_some());
        assert!(cp.preexisting().contains(Path::new("notes.txt")));

        std::fs::write(tmp.path().join("README.md"), "clobbered").unwrap();
        std::fs::create_dir_all(tmp.path().join("src")).unwrap();
        std::fs::write(tmp.path().join("src/new.ts"), "new").unwrap();

        tx.rollback(&cp).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(tmp.path().join("README.md")).unwrap(),
            "# project\n"
        );
        assert!(!tmp.path().join("src/new.ts").exists());
        assert_eq!(std::fs::read_to_string(tmp.path().join("notes.txt")).unwrap(), "mine");
    }

    #[tokio::test]
    async fn checkpoint_keeps_uncommitted_tracked_edits() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());
        std::fs::write(tmp.path().join("README.md"), "work in progress").unwrap();

        let tx = GitTransaction::new(tmp.path().to_path_buf());
        let cp = tx.checkpoint().await.unwrap();
        std::fs::write(tmp.path().join("README.md"), "clobbered").unwrap();
        tx.rollback(&cp).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(tmp.path().join("README.md")).unwrap(),
            "work in progress"
        );
    }

    #[tokio::test]
    async fn unborn_branch_still_removes_new_files() {
        let tmp = tempfile::tempdir().unwrap();
        git(tmp.path(), &["init", "-q"]);

        let tx = GitTransaction::new(tmp.path().to_path_buf());
        let cp = tx.checkpoint().await.unwrap();
        assert_eq!(cp.tree(), None);

        std::fs::write(tmp.path().join("new.ts"), "new").unwrap();
        tx.rollback(&cp).await.unwrap();
        assert!(!tmp.path().join("new.ts").exists());
    }

    #[tokio::test]
    async fn checkpoint_outside_work_tree_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let tx = GitTransaction::new(tmp.path().to_path_buf());
        // Temp dirs are not normally inside a repository; skip if this one is.
        if tx.git(&["rev-parse", "--is-inside-work-tree"]).await.is_ok() {
            return;
        }
        let err = tx.checkpoint().await.unwrap_err();
        assert!(matches!(err, TransactionError::NotAWorkTree(_)));
    }
}
