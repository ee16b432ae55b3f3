//! Bump severities and the commit-type table values.
//!
//! [`BumpSeverity`] is the module-level result domain. [`CommitTypeBump`] is
//! what a commit type maps to in configuration; it adds `ignore`, which never
//! survives past classification.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::policy::PolicyError;

/// Magnitude of a semantic-version change.
///
/// Variant order is the severity order: `none < patch < minor < major`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum BumpSeverity {
    /// No version change.
    #[default]
    None,
    /// Patch release (x.y.Z).
    Patch,
    /// Minor release (x.Y.0).
    Minor,
    /// Major release (X.0.0).
    Major,
}

impl BumpSeverity {
    /// All severities, lowest first.
    pub const ALL: &[Self] = &[Self::None, Self::Patch, Self::Minor, Self::Major];

    /// Returns the severity as a lowercase string slice.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Patch => "patch",
            Self::Minor => "minor",
            Self::Major => "major",
        }
    }

    /// `true` for anything above `none`.
    pub const fn is_bump(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for BumpSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BumpSeverity {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "patch" => Ok(Self::Patch),
            "minor" => Ok(Self::Minor),
            "major" => Ok(Self::Major),
            other => Err(PolicyError::InvalidPolicy(format!(
                "unknown bump severity '{other}' (expected major, minor, patch or none)"
            ))),
        }
    }
}

impl TryFrom<String> for BumpSeverity {
    type Error = PolicyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Value of an entry in the commit-type table.
///
/// Same as [`BumpSeverity`] plus [`CommitTypeBump::Ignore`], which drops the
/// commit from consideration entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum CommitTypeBump {
    /// Breaking-level change.
    Major,
    /// Feature-level change.
    Minor,
    /// Fix-level change.
    Patch,
    /// Counts as evidence of change, but bumps nothing.
    None,
    /// Not evidence of anything.
    Ignore,
}

impl CommitTypeBump {
    /// The severity this entry contributes, or `None` when ignored.
    pub const fn severity(self) -> Option<BumpSeverity> {
        match self {
            Self::Major => Some(BumpSeverity::Major),
            Self::Minor => Some(BumpSeverity::Minor),
            Self::Patch => Some(BumpSeverity::Patch),
            Self::None => Some(BumpSeverity::None),
            Self::Ignore => None,
        }
    }

    /// Returns the entry as a lowercase string slice.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Patch => "patch",
            Self::None => "none",
            Self::Ignore => "ignore",
        }
    }
}

impl From<BumpSeverity> for CommitTypeBump {
    fn from(severity: BumpSeverity) -> Self {
        match severity {
            BumpSeverity::None => Self::None,
            BumpSeverity::Patch => Self::Patch,
            BumpSeverity::Minor => Self::Minor,
            BumpSeverity::Major => Self::Major,
        }
    }
}

impl fmt::Display for CommitTypeBump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommitTypeBump {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "ignore" {
            return Ok(Self::Ignore);
        }
        s.parse::<BumpSeverity>().map(Self::from).map_err(|_| {
            PolicyError::InvalidPolicy(format!(
                "unknown commit bump '{s}' (expected major, minor, patch, none or ignore)"
            ))
        })
    }
}

impl TryFrom<String> for CommitTypeBump {
    type Error = PolicyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
