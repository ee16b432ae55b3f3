//! Library interface for the `verse` CLI.
//!
//! Exposes the argument parser and command structure as a library, mainly
//! for testing. The actual entry point is in `main.rs`.
//!
//! # Structure
//!
//! - [`Cli`] - The root argument parser (clap derive)
//! - [`Commands`] - Available subcommands
//! - [`commands`] - Command implementations
//! - [`changelog`] - Root changelog summary
//! - [`revision`] - Repository revision lookup
//! - [`style`] - Terminal styling

pub mod changelog;

pub mod commands;

pub mod revision;

pub mod style;

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

/// Color output preference.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Detect terminal capabilities automatically.
    #[default]
    Auto,
    /// Always emit colors.
    Always,
    /// Never emit colors.
    Never,
}

impl ColorChoice {
    /// Configure global color output based on this choice.
    pub fn apply(self) {
        match self {
            Self::Auto => {} // detected per stream in `style::paint`
            Self::Always => owo_colors::set_override(true),
            Self::Never => owo_colors::set_override(false),
        }
    }
}

const ENV_HELP: &str = "\
ENVIRONMENT VARIABLES:
    RUST_LOG           Log filter (e.g., debug, verse_core=trace)
    VERSE_LOG_PATH     Explicit log file path
    VERSE_LOG_DIR      Log directory
";

/// Command-line interface definition for verse.
#[derive(Parser)]
#[command(name = "verse")]
#[command(about = "Dependency-aware semantic versioning for multi-module repositories", long_about = None)]
#[command(version)]
#[command(after_long_help = ENV_HELP)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file (merged over discovered config)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Run as if started in DIR
    #[arg(short = 'C', long, global = true)]
    pub chdir: Option<PathBuf>,

    /// Only print errors (suppresses warnings/info)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// More detail (repeatable; e.g. -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Colorize output
    #[arg(long, global = true, value_enum, default_value_t)]
    pub color: ColorChoice,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,
}

/// Available subcommands for the CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// Compute next versions from project information and commits
    Plan(commands::plan::PlanArgs),

    /// Show package information and the policy in effect
    Info(commands::info::InfoArgs),
}

/// Returns the clap command, for help rendering and tests.
pub fn command() -> clap::Command {
    Cli::command()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        command().debug_assert();
    }

    #[test]
    fn plan_requires_project() {
        assert!(Cli::try_parse_from(["verse", "plan"]).is_err());
        let cli = Cli::try_parse_from(["verse", "plan", "--project", "p.json", "--prerelease"]).unwrap();
        match cli.command {
            Commands::Plan(args) => {
                assert_eq!(args.project, PathBuf::from("p.json"));
                assert!(args.prerelease);
            }
            Commands::Info(_) => panic!("expected plan"),
        }
    }
}
