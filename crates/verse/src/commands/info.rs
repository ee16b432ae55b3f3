//! Info command: show package, config, and effective policy.

use clap::Args;
use serde::Serialize;
use tracing::{debug, instrument};

use camino::Utf8PathBuf;
use verse_core::config::Config;
use verse_core::{PolicyConfig, RunOptions};

use crate::style::{accent, bold, dimmed, heading, success, warning};

/// Arguments for the `info` subcommand.
#[derive(Args, Debug, Default)]
pub struct InfoArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Serialize)]
struct PackageInfo {
    name: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    description: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    repository: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    license: &'static str,
}

impl PackageInfo {
    const fn new() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            description: env!("CARGO_PKG_DESCRIPTION"),
            repository: env!("CARGO_PKG_REPOSITORY"),
            license: env!("CARGO_PKG_LICENSE"),
        }
    }
}

#[derive(Serialize)]
struct ConfigInfo {
    /// Files merged over the defaults, lowest precedence first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    config_files: Vec<String>,
    log_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_dir: Option<String>,
}

impl ConfigInfo {
    fn from_config(config: &Config, sources: &[Utf8PathBuf]) -> Self {
        Self {
            config_files: sources.iter().map(ToString::to_string).collect(),
            log_level: config.log_level.as_str().to_string(),
            log_dir: config.log_dir.as_ref().map(|p| p.to_string()),
        }
    }
}

#[derive(Serialize)]
struct FullInfo {
    #[serde(flatten)]
    package: PackageInfo,
    config: ConfigInfo,
    policy: PolicyConfig,
    release: RunOptions,
}

/// Print package information and the policy in effect.
#[instrument(name = "cmd_info", skip_all, fields(json_output))]
pub fn cmd_info(
    _args: InfoArgs,
    global_json: bool,
    config: &Config,
    sources: &[Utf8PathBuf],
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing info command");

    let info = FullInfo {
        package: PackageInfo::new(),
        config: ConfigInfo::from_config(config, sources),
        policy: config.policy(),
        release: config.release.clone(),
    };

    if global_json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("{} {}", bold(info.package.name), success(info.package.version));
    if !info.package.description.is_empty() {
        println!("{}", info.package.description);
    }
    if !info.package.license.is_empty() {
        println!("{}: {}", dimmed("License"), info.package.license);
    }
    if !info.package.repository.is_empty() {
        println!("{}: {}", dimmed("Repository"), accent(info.package.repository));
    }

    println!();
    println!("{}", heading("Configuration"));
    if info.config.config_files.is_empty() {
        println!("{}: {}", dimmed("Config file"), warning("none loaded"));
    }
    for path in &info.config.config_files {
        println!("{}: {}", dimmed("Config file"), accent(path));
    }
    println!("{}: {}", dimmed("Log level"), info.config.log_level);
    if let Some(ref dir) = info.config.log_dir {
        println!("{}: {}", dimmed("Log directory"), dir);
    }

    println!();
    println!("{}", heading("Bump Policy"));
    println!("{}: {}", dimmed("Default bump"), accent(info.policy.default_bump));
    for (commit_type, bump) in &info.policy.commit_types {
        println!("  {commit_type:<10} {bump}");
    }
    let rules = &info.policy.dependency_rules;
    println!(
        "{}: major → {}, minor → {}, patch → {}",
        dimmed("Dependency rules"),
        rules.on_major_of_dependency,
        rules.on_minor_of_dependency,
        rules.on_patch_of_dependency
    );
    println!(
        "{}: prerelease id {}",
        dimmed("Release"),
        accent(&info.release.prerelease_id)
    );

    Ok(())
}
