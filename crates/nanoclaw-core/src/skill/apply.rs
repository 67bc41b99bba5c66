//! Apply orchestrator.
//!
//! Sequences one skill apply through
//! `Validating -> Checkpointed -> Materializing -> Hooking -> Committing -> Done`.
//! Any failure after the checkpoint moves to `Failing`, which always rolls the
//! tree back before the error is reported (`RolledBack`). Validation failures
//! happen before a checkpoint exists and leave nothing to undo.
//!
//! The engine holds no lock: callers must not run two applies against the
//! same project at once.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::Utc;
use nanoclaw_types::error::ApplyError;
use nanoclaw_types::skill::{ApplyResult, SKILLS_SYSTEM_VERSION, SkillManifest};
use nanoclaw_types::state::{AppliedSkill, ProjectState};

use crate::service::hash::ContentHasher;
use crate::skill::hooks::{HookRunner, run_post_apply};
use crate::skill::manifest::{load_manifest, parse_semver_field, validate_manifest};
use crate::skill::materializer::{MaterializeReport, Materializer};
use crate::skill::sandbox::PathResolver;
use crate::skill::snapshot::SnapshotStore;
use crate::skill::state::StateStore;
use crate::skill::transaction::{Checkpoint, Transaction};

/// Phases of one apply, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyPhase {
    Validating,
    Checkpointed,
    Materializing,
    Hooking,
    Committing,
    Done,
    Failing,
    RolledBack,
}

impl fmt::Display for ApplyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validating => "validating",
            Self::Checkpointed => "checkpointed",
            Self::Materializing => "materializing",
            Self::Hooking => "hooking",
            Self::Committing => "committing",
            Self::Done => "done",
            Self::Failing => "failing",
            Self::RolledBack => "rolled_back",
        };
        f.write_str(name)
    }
}

/// Successful outcome of an apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Files were written, hooks ran and the ledger was updated.
    Applied {
        skill: String,
        version: String,
        report: MaterializeReport,
    },
    /// This exact skill version is already in the ledger; nothing was done.
    AlreadyApplied { skill: String, version: String },
}

/// Applies skill packages to one project.
///
/// Generic over the checkpoint, hook and hashing ports so tests can run the
/// whole pipeline without git or a shell.
pub struct SkillApplier<T, H, C>
where
    T: Transaction,
    H: HookRunner,
    C: ContentHasher,
{
    project_root: PathBuf,
    transaction: T,
    hooks: H,
    hasher: C,
    engine_version: String,
}

impl<T, H, C> SkillApplier<T, H, C>
where
    T: Transaction,
    H: HookRunner,
    C: ContentHasher,
{
    pub fn new(project_root: PathBuf, transaction: T, hooks: H, hasher: C) -> Self {
        Self {
            project_root,
            transaction,
            hooks,
            hasher,
            engine_version: SKILLS_SYSTEM_VERSION.to_owned(),
        }
    }

    /// Override the engine version the version gate compares against.
    pub fn with_engine_version(mut self, version: impl Into<String>) -> Self {
        self.engine_version = version.into();
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Apply the package at `skill_dir`, reporting failure in the result record.
    pub async fn apply(&self, skill_dir: &Path) -> ApplyResult {
        match self.try_apply(skill_dir).await {
            Ok(_) => ApplyResult::ok(),
            Err(err) => {
                if err.is_fatal() {
                    tracing::error!(error = %err, "skill apply left the project inconsistent");
                } else {
                    tracing::warn!(error = %err, "skill apply failed");
                }
                ApplyResult::failed(err.to_string())
            }
        }
    }

    /// Apply the package at `skill_dir`.
    pub async fn try_apply(&self, skill_dir: &Path) -> Result<ApplyOutcome, ApplyError> {
        enter(ApplyPhase::Validating, skill_dir);
        let manifest = load_manifest(skill_dir, &self.engine_version)?;
        validate_manifest(&manifest, &self.engine_version)?;

        let state_store = StateStore::for_project(&self.project_root);
        let mut state = state_store.load()?;

        let version = parse_semver_field("version", &manifest.version)?;
        if state.is_applied(&manifest.skill, &version) {
            tracing::info!(
                skill = %manifest.skill,
                version = %version,
                "skill already applied, nothing to do"
            );
            return Ok(ApplyOutcome::AlreadyApplied {
                skill: manifest.skill,
                version: manifest.version,
            });
        }
        check_ledger(&manifest, &state)?;
        warn_on_core_version(&manifest, &state);

        let resolver = PathResolver::new(&self.project_root, state.path_remap.clone())?;
        let snapshots = SnapshotStore::for_project(resolver.root());

        let mut checkpoint = self.transaction.checkpoint().await?;
        enter(ApplyPhase::Checkpointed, skill_dir);

        enter(ApplyPhase::Materializing, skill_dir);
        let materialized = Materializer::new(skill_dir, &resolver, &snapshots, &self.hasher)
            .and_then(|m| m.materialize(&manifest, &mut checkpoint));
        let report = match materialized {
            Ok(report) => report,
            Err(err) => return Err(self.roll_back(checkpoint, &snapshots, err).await),
        };

        enter(ApplyPhase::Hooking, skill_dir);
        if let Err(err) = run_post_apply(&self.hooks, &manifest.post_apply, resolver.root()).await {
            return Err(self.roll_back(checkpoint, &snapshots, err).await);
        }

        enter(ApplyPhase::Committing, skill_dir);
        state.record_applied(AppliedSkill {
            name: manifest.skill.clone(),
            version,
            applied_at: Utc::now(),
            file_hashes: report.file_hashes.clone(),
        });
        if let Err(err) = state_store.save(&state) {
            return Err(self.roll_back(checkpoint, &snapshots, err).await);
        }
        if let Err(err) = self.transaction.commit(checkpoint).await {
            tracing::warn!(error = %err, "failed to discard checkpoint after a successful apply");
        }

        enter(ApplyPhase::Done, skill_dir);
        tracing::info!(
            skill = %manifest.skill,
            version = %manifest.version,
            added = report.added.len(),
            modified = report.modified.len(),
            "skill applied"
        );

        Ok(ApplyOutcome::Applied {
            skill: manifest.skill,
            version: manifest.version,
            report,
        })
    }

    /// Undo everything since `checkpoint` and return the error to report.
    ///
    /// Returns `cause` itself when the tree was fully restored, otherwise a
    /// [`ApplyError::RollbackFailed`] wrapping it.
    async fn roll_back(
        &self,
        checkpoint: Checkpoint,
        snapshots: &SnapshotStore,
        cause: ApplyError,
    ) -> ApplyError {
        tracing::debug!(phase = %ApplyPhase::Failing, error = %cause, "rolling back");

        let mut failures = Vec::new();
        if let Err(e) = self.transaction.rollback(&checkpoint).await {
            failures.push(e.to_string());
        }
        failures.extend(checkpoint.revert_journal(snapshots));

        if failures.is_empty() {
            tracing::debug!(phase = %ApplyPhase::RolledBack, "project tree restored");
            cause
        } else {
            ApplyError::RollbackFailed {
                cause: Box::new(cause),
                reason: failures.join("; "),
            }
        }
    }
}

fn enter(phase: ApplyPhase, skill_dir: &Path) {
    tracing::debug!(phase = %phase, package = %skill_dir.display(), "apply phase");
}

/// `depends` must all be applied and `conflicts` must not be.
fn check_ledger(manifest: &SkillManifest, state: &ProjectState) -> Result<(), ApplyError> {
    if let Some(missing) = manifest.depends.iter().find(|d| state.applied(d).is_none()) {
        return Err(ApplyError::DependencyMissing {
            skill: manifest.skill.clone(),
            dependency: missing.clone(),
        });
    }
    if let Some(other) = manifest.conflicts.iter().find(|c| state.applied(c).is_some()) {
        return Err(ApplyError::SkillConflict {
            skill: manifest.skill.clone(),
            other: other.clone(),
        });
    }
    Ok(())
}

/// `core_version` is advisory: a package built against a newer core than the
/// project records is applied with a warning.
fn warn_on_core_version(manifest: &SkillManifest, state: &ProjectState) {
    let Some(project_core) = state
        .core_version
        .as_deref()
        .and_then(|v| semver::Version::parse(v).ok())
    else {
        return;
    };
    if let Ok(built_for) = semver::Version::parse(&manifest.core_version) {
        if built_for > project_core {
            tracing::warn!(
                skill = %manifest.skill,
                built_for = %built_for,
                project_core = %project_core,
                "skill was built against a newer core version"
            );
        }
    }
}
