use thiserror::Error;

/// Errors from applying a skill package.
///
/// Everything except [`ApplyError::RollbackFailed`] is reported after the
/// project tree has been restored to its pre-apply state.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("skill requires skills system version {required} (this engine is {current})")]
    VersionIncompatible { required: String, current: String },

    #[error("invalid manifest: {0}")]
    ManifestInvalid(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("path '{0}' cannot be placed inside the project root")]
    PathEscape(String),

    #[error("skill '{skill}' depends on '{dependency}', which is not applied")]
    DependencyMissing { skill: String, dependency: String },

    #[error("skill '{skill}' conflicts with applied skill '{other}'")]
    SkillConflict { skill: String, other: String },

    #[error("post_apply failed: {0}")]
    HookFailed(#[from] HookError),

    #[error("checkpoint failed: {0}")]
    Checkpoint(#[from] TransactionError),

    #[error("state update failed: {0}")]
    State(String),

    #[error("I/O error on {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("FATAL: rollback failed after '{cause}': {reason}; the project tree may be inconsistent")]
    RollbackFailed {
        cause: Box<ApplyError>,
        reason: String,
    },
}

impl ApplyError {
    /// Wrap an I/O failure on `path`.
    pub fn io(path: impl std::fmt::Display, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.to_string(),
            reason: err.to_string(),
        }
    }

    /// Whether the project may have been left half-applied.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RollbackFailed { .. })
    }
}

/// Errors from a `post_apply` command.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("could not start `{command}`: {reason}")]
    Spawn { command: String, reason: String },

    #[error("`{command}` exited with {status}")]
    Exited { command: String, status: String },

    #[error("`{command}` timed out after {secs}s")]
    TimedOut { command: String, secs: u64 },
}

/// Errors from checkpointing or restoring the project working tree.
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("'{0}' is not inside a version-controlled work tree")]
    NotAWorkTree(String),

    #[error("could not run {command}: {reason}")]
    Spawn { command: String, reason: String },

    #[error("{command} failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("rollback incomplete: {}", .0.join("; "))]
    Incomplete(Vec<String>),
}

/// Errors from the path sandbox.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("project root '{path}' cannot be resolved: {reason}")]
    Root { path: String, reason: String },

    #[error("'{0}' resolves outside the project root")]
    Escapes(String),

    #[error("'{path}' cannot be created: {reason}")]
    Blocked { path: String, reason: String },
}

impl From<SandboxError> for ApplyError {
    fn from(err: SandboxError) -> Self {
        match err {
            SandboxError::Escapes(path) => Self::PathEscape(path),
            SandboxError::Root { path, reason } => Self::Io { path, reason },
            SandboxError::Blocked { path, reason } => {
                Self::Conflict(format!("'{path}' cannot be created: {reason}"))
            }
        }
    }
}
