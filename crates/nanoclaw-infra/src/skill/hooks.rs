//! Shell-backed [`HookRunner`].
//!
//! Runs each `post_apply` command through `<shell> -c` in the project root.
//! Output is captured and only surfaced in logs when the command fails.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use nanoclaw_core::skill::hooks::HookRunner;
use nanoclaw_types::config::EngineConfig;
use nanoclaw_types::error::HookError;

/// Runs hook commands with a configurable shell and optional timeout.
#[derive(Debug, Clone)]
pub struct ShellHookRunner {
    shell: String,
    timeout: Option<Duration>,
}

impl ShellHookRunner {
    pub fn new(shell: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            shell: shell.into(),
            timeout,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.shell.clone(),
            config.hook_timeout_secs.map(Duration::from_secs),
        )
    }
}

impl Default for ShellHookRunner {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl HookRunner for ShellHookRunner {
    async fn run(&self, command: &str, cwd: &Path) -> Result<(), HookError> {
        let child = tokio::process::Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| HookError::Spawn {
                command: command.to_owned(),
                reason: e.to_string(),
            })?;

        let waited = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| HookError::TimedOut {
                    command: command.to_owned(),
                    secs: limit.as_secs(),
                })?,
            None => child.wait_with_output().await,
        };
        let output = waited.map_err(|e| HookError::Spawn {
            command: command.to_owned(),
            reason: e.to_string(),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(
                command = %command,
                status = %output.status,
                stderr = %stderr.trim(),
                "post_apply command failed"
            );
            return Err(HookError::Exited {
                command: command.to_owned(),
                status: output.status.to_string(),
            });
        }

        tracing::debug!(command = %command, "post_apply command succeeded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_in_given_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = ShellHookRunner::default();

        runner
            .run("echo applied > marker.txt", tmp.path())
            .await
            .unwrap();

        let marker = std::fs::read_to_string(tmp.path().join("marker.txt")).unwrap();
        assert_eq!(marker.trim(), "applied");
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = ShellHookRunner::default()
            .run("false", tmp.path())
            .await
            .unwrap_err();
        assert!(matches!(err, HookError::Exited { ref command, .. } if command == "false"));
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = ShellHookRunner::new("sh", Some(Duration::from_millis(200)));

        let err = runner.run("sleep 5", tmp.path()).await.unwrap_err();
        assert!(matches!(err, HookError::TimedOut { .. }));
    }

    #[tokio::test]
    async fn missing_shell_is_a_spawn_error() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = ShellHookRunner::new("/nonexistent/shell", None);

        let err = runner.run("true", tmp.path()).await.unwrap_err();
        assert!(matches!(err, HookError::Spawn { .. }));
    }
}
