//! CLI skill subcommands: apply, check, list.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use nanoclaw_core::skill::apply::ApplyOutcome;
use nanoclaw_core::skill::manifest::{load_manifest, validate_manifest};
use nanoclaw_types::skill::SKILLS_SYSTEM_VERSION;

use crate::state::AppState;

/// Skill subcommands.
#[derive(Subcommand)]
pub enum SkillCommand {
    /// Apply a skill package to the project.
    Apply {
        /// Path to the skill package directory (contains manifest.yaml).
        path: PathBuf,
    },

    /// Parse and validate a skill package without applying it.
    Check {
        /// Path to the skill package directory.
        path: PathBuf,
    },

    /// List skills recorded as applied.
    #[command(alias = "ls")]
    List,
}

/// Handle a skill subcommand.
pub async fn handle_skill_command(
    cmd: SkillCommand,
    state: &AppState,
    json: bool,
    quiet: bool,
) -> Result<()> {
    match cmd {
        SkillCommand::Apply { path } => handle_apply(&path, state, json, quiet).await,
        SkillCommand::Check { path } => handle_check(&path, state, json),
        SkillCommand::List => handle_list(state, json),
    }
}

// ---------------------------------------------------------------------------
// Apply
// ---------------------------------------------------------------------------

async fn handle_apply(path: &Path, state: &AppState, json: bool, quiet: bool) -> Result<()> {
    let outcome = state.applier().try_apply(path).await;

    if json {
        let out = match &outcome {
            Ok(ApplyOutcome::Applied {
                skill,
                version,
                report,
            }) => serde_json::json!({
                "success": true,
                "skill": skill,
                "version": version,
                "added": report.added,
                "modified": report.modified,
            }),
            Ok(ApplyOutcome::AlreadyApplied { skill, version }) => serde_json::json!({
                "success": true,
                "skill": skill,
                "version": version,
                "already_applied": true,
            }),
            Err(err) => serde_json::json!({
                "success": false,
                "error": err.to_string(),
                "fatal": err.is_fatal(),
            }),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    }

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(err) => {
            if !json && err.is_fatal() {
                eprintln!();
                eprintln!(
                    "  {} {}",
                    style("!").red().bold(),
                    style("The project may be partially modified. Inspect `git status` before retrying.").red()
                );
                eprintln!();
            }
            bail!("Failed to apply {}: {err}", path.display());
        }
    };

    if json || quiet {
        return Ok(());
    }

    println!();
    match outcome {
        ApplyOutcome::Applied {
            skill,
            version,
            report,
        } => {
            println!(
                "  {} Applied {} v{}",
                style("✓").green().bold(),
                style(&skill).cyan(),
                version
            );
            for file in &report.added {
                println!("    {} {}", style("+").green(), file);
            }
            for file in &report.modified {
                println!("    {} {}", style("~").yellow(), file);
            }
        }
        ApplyOutcome::AlreadyApplied { skill, version } => {
            println!(
                "  {} {} v{} is already applied",
                style("·").dim(),
                style(&skill).cyan(),
                version
            );
        }
    }
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// Check
// ---------------------------------------------------------------------------

fn handle_check(path: &Path, state: &AppState, json: bool) -> Result<()> {
    let manifest = load_manifest(path, SKILLS_SYSTEM_VERSION)
        .and_then(|m| validate_manifest(&m, SKILLS_SYSTEM_VERSION).map(|()| m))
        .with_context(|| format!("Skill package {} is invalid", path.display()))?;

    let ledger = state.state_store().load()?;
    let applied = ledger
        .applied(&manifest.skill)
        .map(|entry| entry.version.to_string());

    if json {
        let out = serde_json::json!({
            "valid": true,
            "skill": manifest.skill,
            "version": manifest.version,
            "core_version": manifest.core_version,
            "adds": manifest.adds,
            "modifies": manifest.modifies,
            "post_apply": manifest.post_apply,
            "depends": manifest.depends,
            "conflicts": manifest.conflicts,
            "applied_version": applied,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {} v{} is valid",
        style("✓").green().bold(),
        style(&manifest.skill).cyan(),
        manifest.version
    );
    if let Some(description) = &manifest.description {
        println!("  {}", style(description).dim());
    }
    println!();
    println!("  Adds:       {}", manifest.adds.len());
    println!("  Modifies:   {}", manifest.modifies.len());
    println!("  post_apply: {}", manifest.post_apply.len());
    if !manifest.depends.is_empty() {
        println!("  Depends:    {}", manifest.depends.join(", "));
    }
    if !manifest.conflicts.is_empty() {
        println!("  Conflicts:  {}", manifest.conflicts.join(", "));
    }
    match applied {
        Some(version) => println!("  Applied:    {}", style(format!("v{version}")).green()),
        None => println!("  Applied:    {}", style("no").dim()),
    }
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

fn handle_list(state: &AppState, json: bool) -> Result<()> {
    let ledger = state.state_store().load()?;

    if json {
        let out: Vec<_> = ledger
            .applied_skills
            .iter()
            .map(|s| {
                serde_json::json!({
                    "name": s.name,
                    "version": s.version.to_string(),
                    "applied_at": s.applied_at.to_rfc3339(),
                    "files": s.file_hashes.len(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if ledger.applied_skills.is_empty() {
        println!();
        println!("  No skills applied. Use 'nanoclaw skill apply <dir>' to add one.");
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Name").fg(Color::Cyan),
            Cell::new("Version"),
            Cell::new("Applied"),
            Cell::new("Files"),
        ]);

    for s in &ledger.applied_skills {
        table.add_row(vec![
            Cell::new(&s.name),
            Cell::new(s.version.to_string()),
            Cell::new(s.applied_at.format("%Y-%m-%d %H:%M UTC").to_string()),
            Cell::new(s.file_hashes.len()),
        ]);
    }

    println!();
    println!("{table}");
    println!();

    Ok(())
}
