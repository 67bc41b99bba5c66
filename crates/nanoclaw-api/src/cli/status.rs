//! Project status command.
//!
//! Prints a machine-parseable status block:
//!
//! ```text
//! === NANOCLAW SETUP: STATUS ===
//! key: value
//! === END ===
//! ```

use std::process::Stdio;

use anyhow::Result;
use nanoclaw_types::skill::SKILLS_SYSTEM_VERSION;
use nanoclaw_types::state::base_dir;

use crate::state::AppState;

/// Render one status block for `step`.
pub fn format_status(step: &str, fields: &[(&str, String)]) -> String {
    let mut lines = vec![format!("=== NANOCLAW SETUP: {step} ===")];
    lines.extend(fields.iter().map(|(key, value)| format!("{key}: {value}")));
    lines.push("=== END ===".to_owned());
    lines.join("\n")
}

/// Display the project's skills status.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let store = state.state_store();
    let ledger = store.load()?;
    let in_git = inside_git_work_tree(state).await;

    let applied: Vec<String> = ledger
        .applied_skills
        .iter()
        .map(|s| format!("{}@{}", s.name, s.version))
        .collect();

    if json {
        let out = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "skills_system_version": SKILLS_SYSTEM_VERSION,
            "project_root": state.project_root.display().to_string(),
            "git_work_tree": in_git,
            "state_file": store.path().exists(),
            "core_version": ledger.core_version,
            "applied_skills": applied,
            "path_remaps": ledger.path_remap.len(),
            "hook_shell": state.config.shell,
            "hook_timeout_secs": state.config.hook_timeout_secs,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let fields = [
        ("VERSION", env!("CARGO_PKG_VERSION").to_owned()),
        ("SKILLS_SYSTEM_VERSION", SKILLS_SYSTEM_VERSION.to_owned()),
        ("PROJECT_ROOT", state.project_root.display().to_string()),
        ("GIT_WORK_TREE", in_git.to_string()),
        ("STATE_FILE", store.path().exists().to_string()),
        (
            "CORE_VERSION",
            ledger.core_version.clone().unwrap_or_else(|| "unknown".to_owned()),
        ),
        ("APPLIED_SKILLS", applied.len().to_string()),
        ("SKILLS", if applied.is_empty() { "none".to_owned() } else { applied.join(",") }),
        ("PATH_REMAPS", ledger.path_remap.len().to_string()),
        ("SNAPSHOTS", base_dir(&state.project_root).exists().to_string()),
        ("HOOK_SHELL", state.config.shell.clone()),
        (
            "HOOK_TIMEOUT_SECS",
            state
                .config
                .hook_timeout_secs
                .map_or_else(|| "none".to_owned(), |s| s.to_string()),
        ),
        ("STATUS", if in_git { "ready" } else { "needs_git" }.to_owned()),
    ];
    println!("{}", format_status("STATUS", &fields));

    Ok(())
}

async fn inside_git_work_tree(state: &AppState) -> bool {
    tokio::process::Command::new("git")
        .args(["rev-parse", "--is-inside-work-tree"])
        .current_dir(&state.project_root)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .is_ok_and(|s| s.success())
}
