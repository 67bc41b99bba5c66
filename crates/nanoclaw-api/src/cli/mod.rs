//! CLI command definitions for the `nanoclaw` binary.
//!
//! Uses clap derive macros for argument parsing. Skill operations live under
//! the `skill` noun (`nanoclaw skill apply <dir>`).

pub mod skill;
pub mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Apply skill packages to a nanoclaw project.
#[derive(Parser)]
#[command(name = "nanoclaw", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Project root (defaults to the current directory).
    #[arg(long, global = true, env = "NANOCLAW_PROJECT_DIR")]
    pub project: Option<PathBuf>,

    /// Emit log lines as JSON objects.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true, env = "NANOCLAW_OTEL")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply, check and list skill packages.
    Skill {
        #[command(subcommand)]
        action: skill::SkillCommand,
    },

    /// Print the project's skills status block.
    Status,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

impl Cli {
    /// Log filter implied by `--quiet` and `-v`.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "warn",
            1 => "info,nanoclaw_core=debug,nanoclaw_infra=debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_skill_apply_with_globals() {
        let cli = Cli::try_parse_from([
            "nanoclaw",
            "--json",
            "-v",
            "skill",
            "apply",
            "skills/add-feishu",
        ])
        .unwrap();

        assert!(cli.json);
        assert_eq!(cli.log_filter(), "info,nanoclaw_core=debug,nanoclaw_infra=debug");
        match cli.command {
            Commands::Skill {
                action: skill::SkillCommand::Apply { path },
            } => assert_eq!(path, PathBuf::from("skills/add-feishu")),
            _ => panic!("expected skill apply"),
        }
    }

    #[test]
    fn quiet_lowers_log_level() {
        let cli = Cli::try_parse_from(["nanoclaw", "--quiet", "status"]).unwrap();
        assert_eq!(cli.log_filter(), "error");
    }

    #[test]
    fn cli_definition_is_consistent() {
        <Cli as clap::CommandFactory>::command().debug_assert();
    }
}
