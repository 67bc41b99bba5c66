//! Post-install hook execution port.

use std::future::Future;
use std::path::Path;

use nanoclaw_types::error::{ApplyError, HookError};

/// Runs one `post_apply` command to completion.
///
/// Implementors include:
/// - `ShellHookRunner` (nanoclaw-infra; `sh -c` with an optional timeout)
pub trait HookRunner: Send + Sync {
    /// Run `command` with `cwd` as its working directory.
    ///
    /// Only the exit status matters: a non-zero exit is a [`HookError`].
    fn run(&self, command: &str, cwd: &Path) -> impl Future<Output = Result<(), HookError>> + Send;
}

/// Run every `post_apply` command in declared order.
///
/// Stops at the first failure; later commands are not run.
pub async fn run_post_apply<H: HookRunner>(
    runner: &H,
    commands: &[String],
    cwd: &Path,
) -> Result<(), ApplyError> {
    for (index, command) in commands.iter().enumerate() {
        tracing::info!(
            command = %command,
            step = index + 1,
            total = commands.len(),
            "running post_apply command"
        );
        runner.run(command, cwd).await?;
    }
    Ok(())
}
