//! Bump policy: how commits and dependency changes turn into severities.
//!
//! A [`PolicyConfig`] is normally loaded as part of [`Config`](crate::Config)
//! and deep-merged over [`PolicyConfig::default`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::severity::{BumpSeverity, CommitTypeBump};

/// Errors from policy handling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// A configuration value outside its enumerated set reached the engine.
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),
}

/// Result alias for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// The configurable mapping from commits and dependency changes to bumps.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct PolicyConfig {
    /// Bump for commits whose type is absent from [`commit_types`](Self::commit_types).
    pub default_bump: CommitTypeBump,
    /// Commit type (e.g. `feat`) to bump.
    pub commit_types: BTreeMap<String, CommitTypeBump>,
    /// What a module inherits when one of its dependencies changes.
    pub dependency_rules: DependencyRules,
    /// Which unchanged modules a `bump_unchanged` run elevates.
    pub unchanged: UnchangedScope,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        let commit_types = [
            ("feat", CommitTypeBump::Minor),
            ("fix", CommitTypeBump::Patch),
            ("perf", CommitTypeBump::Patch),
            ("refactor", CommitTypeBump::Patch),
            ("docs", CommitTypeBump::Ignore),
            ("test", CommitTypeBump::Ignore),
            ("chore", CommitTypeBump::Ignore),
            ("style", CommitTypeBump::Ignore),
            ("ci", CommitTypeBump::Ignore),
            ("build", CommitTypeBump::Ignore),
        ]
        .into_iter()
        .map(|(ty, bump)| (ty.to_string(), bump))
        .collect();

        Self {
            default_bump: CommitTypeBump::Patch,
            commit_types,
            dependency_rules: DependencyRules::default(),
            unchanged: UnchangedScope::default(),
        }
    }
}

impl PolicyConfig {
    /// Look up the table entry for a commit type, falling back to the default.
    pub fn bump_for_type(&self, commit_type: Option<&str>) -> CommitTypeBump {
        commit_type
            .and_then(|ty| self.commit_types.get(ty))
            .copied()
            .unwrap_or(self.default_bump)
    }

    /// Check the parts of the policy the type system cannot.
    ///
    /// Severity values are enumerated by type, so this only rejects
    /// commit-type keys that no commit could ever carry.
    pub fn validate(&self) -> PolicyResult<()> {
        for key in self.commit_types.keys() {
            if key.is_empty() {
                return Err(PolicyError::InvalidPolicy(
                    "commit type keys must not be empty".into(),
                ));
            }
            if key.chars().any(char::is_whitespace) {
                return Err(PolicyError::InvalidPolicy(format!(
                    "commit type '{key}' must not contain whitespace"
                )));
            }
        }
        Ok(())
    }
}

/// Severity a module inherits for each severity of a changed dependency.
///
/// These slots are [`BumpSeverity`], never `ignore`: a dependency change
/// always resolves to some decision, even if that decision is `none`.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct DependencyRules {
    /// Inherited when a dependency bumps major.
    pub on_major_of_dependency: BumpSeverity,
    /// Inherited when a dependency bumps minor.
    pub on_minor_of_dependency: BumpSeverity,
    /// Inherited when a dependency bumps patch.
    pub on_patch_of_dependency: BumpSeverity,
}

impl Default for DependencyRules {
    fn default() -> Self {
        Self {
            on_major_of_dependency: BumpSeverity::Minor,
            on_minor_of_dependency: BumpSeverity::Patch,
            on_patch_of_dependency: BumpSeverity::Patch,
        }
    }
}

impl DependencyRules {
    /// Severity induced on a dependent by a dependency bumping at `severity`.
    pub const fn induced_by(&self, severity: BumpSeverity) -> BumpSeverity {
        match severity {
            BumpSeverity::Major => self.on_major_of_dependency,
            BumpSeverity::Minor => self.on_minor_of_dependency,
            BumpSeverity::Patch => self.on_patch_of_dependency,
            BumpSeverity::None => BumpSeverity::None,
        }
    }
}

/// Which modules with a final severity of `none` a `bump_unchanged` run elevates.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum UnchangedScope {
    /// Every unchanged module gets a patch-level bump.
    #[default]
    All,
    /// Only unchanged modules with at least one changed dependency.
    ChangedDependencies,
}
