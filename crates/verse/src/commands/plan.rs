//! Plan command: compute every module's next version.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use camino::Utf8Path;
use chrono::Utc;
use clap::Args;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use verse_core::config::Config;
use verse_core::registry::{ModuleKind, RawProjectInformation};
use verse_core::{
    CommitInfo, CommitRecord, ModuleChangeResult, ModuleRegistry, ReleaseContext, RunOptions,
    VersionBumper,
};

use crate::style::{accent, bold, dimmed, success};
use crate::{changelog, revision};

/// Arguments for the `plan` subcommand.
#[derive(Args, Debug, Default)]
pub struct PlanArgs {
    /// Project information printed by a build-system adapter ("-" for stdin)
    #[arg(long, value_name = "FILE")]
    pub project: PathBuf,

    /// Commits per module id, as messages or structured objects
    #[arg(long, value_name = "FILE")]
    pub commits: Option<PathBuf>,

    /// Produce prerelease versions
    #[arg(long)]
    pub prerelease: bool,

    /// Prerelease identifier (default from config, else "alpha")
    #[arg(long, value_name = "ID")]
    pub prerelease_id: Option<String>,

    /// Give unchanged modules a patch bump
    #[arg(long)]
    pub bump_unchanged: bool,

    /// Append the short git revision as build metadata
    #[arg(long)]
    pub build_metadata: bool,

    /// Append -SNAPSHOT to new versions
    #[arg(long)]
    pub snapshot: bool,

    /// Use a UTC timestamp as the prerelease counter
    #[arg(long)]
    pub timestamp_versions: bool,

    /// Write a summary section to the root CHANGELOG.md
    #[arg(long)]
    pub changelog: bool,
}

impl PlanArgs {
    /// Config defaults with command-line switches applied on top.
    fn run_options(&self, defaults: &RunOptions) -> RunOptions {
        let mut options = defaults.clone();
        options.prerelease_mode |= self.prerelease;
        options.bump_unchanged |= self.bump_unchanged;
        options.add_build_metadata |= self.build_metadata;
        options.append_snapshot |= self.snapshot;
        options.timestamp_versions |= self.timestamp_versions;
        if let Some(ref id) = self.prerelease_id {
            options.prerelease_id.clone_from(id);
        }
        options
    }
}

#[derive(Serialize)]
struct PlanOutput<'a> {
    modules: &'a [ModuleChangeResult],
    changed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    changelog: Option<String>,
}

/// Execute the plan command.
#[instrument(name = "cmd_plan", skip_all, fields(json_output))]
pub fn cmd_plan(
    args: PlanArgs,
    global_json: bool,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing plan command");

    let project = read_input(&args.project)
        .with_context(|| format!("failed to read project information from {}", args.project.display()))?;
    let raw = RawProjectInformation::from_json(&project).context("invalid project information")?;
    let registry = ModuleRegistry::new(raw).context("invalid module graph")?;

    let commits = match args.commits {
        Some(ref path) => load_commits(path)?,
        None => HashMap::new(),
    };

    let options = args.run_options(&config.release);
    let mut context = ReleaseContext::at(Utc::now());
    if options.add_build_metadata {
        match revision::short_revision(cwd).context("failed to read repository revision")? {
            Some(rev) => context = context.with_build_metadata(rev),
            None => warn!("build metadata requested outside a git repository"),
        }
    }

    let policy = config.policy();
    let results = VersionBumper::new(&registry, options)
        .calculate_version_bumps(&commits, &policy, &context)
        .context("version calculation failed")?;

    let changelog_path = if args.changelog {
        let root_id = registry
            .all()
            .find(|m| m.kind == ModuleKind::Root)
            .map(|m| m.id.as_str());
        let path = changelog::write_root_changelog(cwd, &results, context.timestamp.date_naive(), root_id)
            .context("failed to update changelog")?;
        Some(path.to_string())
    } else {
        None
    };

    let changed = results.iter().filter(|r| r.changed()).count();
    if global_json {
        let output = PlanOutput {
            modules: &results,
            changed,
            changelog: changelog_path,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print_table(&results);
    println!();
    println!(
        "{} of {} modules changed",
        bold(changed),
        results.len()
    );
    if let Some(path) = changelog_path {
        println!("  {} Changelog updated: {}", success("✓"), accent(path));
    }
    Ok(())
}

fn print_table(results: &[ModuleChangeResult]) {
    let width = results.iter().map(|r| r.id.len()).max().unwrap_or(0);
    for result in results {
        let from = result.from.as_deref().unwrap_or("none");
        if result.changed() {
            let mut line = format!(
                "  {}  {} → {}  {}",
                bold(format!("{:<width$}", result.id)),
                dimmed(from),
                success(&result.to),
                accent(result.bump)
            );
            if !result.induced_by.is_empty() {
                let sources: Vec<&str> = result.induced_by.iter().map(String::as_str).collect();
                let via = format!("(via {})", sources.join(", "));
                line = format!("{line} {}", dimmed(via));
            }
            println!("{line}");
        } else {
            println!(
                "  {}  {}",
                dimmed(format!("{:<width$}", result.id)),
                dimmed(format!("{} unchanged", result.to))
            );
        }
    }
}

/// Read a file, or stdin for `-`.
fn read_input(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read stdin")?;
        return Ok(buffer);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Load `{ "<module id>": [<message or commit>, ...] }`.
fn load_commits(path: &Path) -> anyhow::Result<HashMap<String, Vec<CommitInfo>>> {
    let text = read_input(path)?;
    let records: HashMap<String, Vec<CommitRecord>> = serde_json::from_str(&text)
        .with_context(|| format!("invalid commit history in {}", path.display()))?;

    Ok(records
        .into_iter()
        .map(|(id, records)| {
            let commits = records
                .into_iter()
                .map(|record| record.into_commit(&id))
                .collect();
            (id, commits)
        })
        .collect())
}
