//! Repository state used as build metadata.
//!
//! Shells out to `git` so the user's own git configuration applies. Outcomes
//! are read from exit codes, never from git's (translatable) messages.

use std::io::ErrorKind;
use std::process::{Command, Output};

use camino::Utf8Path;
use thiserror::Error;
use tracing::{debug, instrument, warn};

const GIT: &str = "git";

/// Errors from reading the repository revision.
#[derive(Error, Debug)]
pub enum RevisionError {
    /// `git` exists but could not be executed.
    #[error("failed to run git: {0}")]
    Exec(#[from] std::io::Error),

    /// `git` returned a non-zero exit code where one was not expected.
    #[error("git {command} failed: {stderr}")]
    Command {
        /// The git arguments that failed.
        command: String,
        /// Captured stderr.
        stderr: String,
    },
}

/// Result alias for revision lookups.
pub type RevisionResult<T> = Result<T, RevisionError>;

/// Short revision id of `HEAD` in the repository containing `dir`.
///
/// Returns `None` when `git` is not installed, outside a work tree, or
/// before the first commit.
#[instrument]
pub fn short_revision(dir: &Utf8Path) -> RevisionResult<Option<String>> {
    short_revision_with(GIT, dir)
}

fn short_revision_with(program: &str, dir: &Utf8Path) -> RevisionResult<Option<String>> {
    let inside = match run(program, dir, &["rev-parse", "--is-inside-work-tree"]) {
        Ok(output) => output,
        Err(RevisionError::Exec(err)) if err.kind() == ErrorKind::NotFound => {
            warn!(program, "git not found; no revision available");
            return Ok(None);
        }
        Err(err) => return Err(err),
    };
    if !inside.status.success() || stdout(&inside) != "true" {
        debug!("not inside a work tree");
        return Ok(None);
    }

    // `--verify --quiet` exits 1 silently when HEAD is unborn.
    let head = run(program, dir, &["rev-parse", "--verify", "--quiet", "--short", "HEAD"])?;
    match head.status.code() {
        Some(0) => {
            let revision = stdout(&head);
            debug!(%revision, "resolved revision");
            Ok(Some(revision))
        }
        Some(1) if head.stderr.is_empty() => {
            debug!("HEAD has no commits yet");
            Ok(None)
        }
        _ => Err(RevisionError::Command {
            command: "rev-parse --verify --quiet --short HEAD".to_string(),
            stderr: String::from_utf8_lossy(&head.stderr).trim().to_string(),
        }),
    }
}

fn run(program: &str, dir: &Utf8Path, args: &[&str]) -> RevisionResult<Output> {
    Ok(Command::new(program)
        .args(args)
        .current_dir(dir)
        .env("LC_ALL", "C")
        .output()?)
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}
