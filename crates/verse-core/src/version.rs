//! Version calculation.
//!
//! Turns a module's final severity into a concrete next version, then applies
//! the run's modifiers in a fixed order: prerelease (counter or timestamp),
//! snapshot suffix, build metadata.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use semver::{BuildMetadata, Prerelease, Version};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::policy::UnchangedScope;
use crate::registry::Module;
use crate::severity::BumpSeverity;

const SNAPSHOT: &str = "SNAPSHOT";
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Errors from version operations.
#[derive(Error, Debug)]
pub enum VersionError {
    /// A module's current version is not valid semver.
    #[error("invalid semver '{input}': {source}")]
    InvalidSemver {
        /// The offending version string.
        input: String,
        /// Parser error.
        source: semver::Error,
    },

    /// The prerelease identifier cannot form a semver prerelease.
    #[error("invalid prerelease identifier '{0}' (expected ASCII letters, digits or '-')")]
    InvalidPrereleaseId(String),

    /// Build metadata cannot form a semver build segment.
    #[error("invalid build metadata '{0}'")]
    InvalidBuildMetadata(String),

    /// A version component or prerelease counter is already at its maximum.
    #[error("cannot increment '{input}': component overflows")]
    Overflow {
        /// The version or prerelease being incremented.
        input: String,
    },
}

/// Result alias for version operations.
pub type VersionResult<T> = Result<T, VersionError>;

/// Parse a version string, stripping an optional `v` prefix.
pub fn parse_version(s: &str) -> VersionResult<Version> {
    let trimmed = s.trim();
    let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(bare).map_err(|source| VersionError::InvalidSemver {
        input: s.to_string(),
        source,
    })
}

/// Apply a severity to a release version.
pub fn next_version(current: &Version, severity: BumpSeverity) -> VersionResult<Version> {
    let (major, minor, patch) = (current.major, current.minor, current.patch);
    let next = match severity {
        BumpSeverity::None => Some(Version::new(major, minor, patch)),
        BumpSeverity::Patch => patch.checked_add(1).map(|p| Version::new(major, minor, p)),
        BumpSeverity::Minor => minor.checked_add(1).map(|m| Version::new(major, m, 0)),
        BumpSeverity::Major => major.checked_add(1).map(|m| Version::new(m, 0, 0)),
    };
    next.ok_or_else(|| VersionError::Overflow {
        input: current.to_string(),
    })
}

/// Per-run switches for version calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Produce `-<id>.<n>` prerelease versions.
    pub prerelease_mode: bool,
    /// Identifier used in prerelease versions.
    pub prerelease_id: String,
    /// Give unchanged modules a patch bump (see [`UnchangedScope`]).
    pub bump_unchanged: bool,
    /// Append `+<metadata>` from the [`ReleaseContext`].
    pub add_build_metadata: bool,
    /// Append `-SNAPSHOT` outside prerelease mode.
    pub append_snapshot: bool,
    /// Use a UTC timestamp as the prerelease counter.
    pub timestamp_versions: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            prerelease_mode: false,
            prerelease_id: "alpha".to_string(),
            bump_unchanged: false,
            add_build_metadata: false,
            append_snapshot: false,
            timestamp_versions: false,
        }
    }
}

impl RunOptions {
    /// Reject a prerelease identifier semver cannot carry.
    pub fn validate(&self) -> VersionResult<()> {
        let id = &self.prerelease_id;
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(VersionError::InvalidPrereleaseId(id.clone()));
        }
        Ok(())
    }
}

/// Repository-derived inputs for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseContext {
    /// Clock reading used for timestamp versions.
    pub timestamp: DateTime<Utc>,
    /// Build metadata (usually a short revision id).
    pub build_metadata: Option<String>,
}

impl ReleaseContext {
    /// Context at the current time without build metadata.
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    /// Context at a fixed time.
    pub const fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            build_metadata: None,
        }
    }

    /// Attach build metadata.
    #[must_use]
    pub fn with_build_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.build_metadata = Some(metadata.into());
        self
    }
}

impl Default for ReleaseContext {
    fn default() -> Self {
        Self::now()
    }
}

/// Outcome for one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleChangeResult {
    /// Module id.
    pub id: String,
    /// Module path.
    pub path: String,
    /// Version before the run; absent for unversioned modules.
    pub from: Option<String>,
    /// Version after the run.
    pub to: String,
    /// Severity that was applied.
    pub bump: BumpSeverity,
    /// Dependencies that raised this module above its own bump.
    #[serde(default)]
    pub induced_by: BTreeSet<String>,
}

impl ModuleChangeResult {
    /// Whether the run produces a new version for this module.
    pub const fn changed(&self) -> bool {
        self.bump.is_bump()
    }
}

/// Computes next versions under one set of run options.
#[derive(Debug, Clone)]
pub struct VersionCalculator<'a> {
    options: &'a RunOptions,
    scope: UnchangedScope,
    context: &'a ReleaseContext,
}

impl<'a> VersionCalculator<'a> {
    /// Create a calculator for one run.
    pub const fn new(
        options: &'a RunOptions,
        scope: UnchangedScope,
        context: &'a ReleaseContext,
    ) -> Self {
        Self {
            options,
            scope,
            context,
        }
    }

    /// Severity actually applied to a module.
    ///
    /// `final_bump` unless it is `none` and the run bumps unchanged modules
    /// that the scope admits, in which case `patch`.
    pub const fn applied(&self, final_bump: BumpSeverity, dependency_changed: bool) -> BumpSeverity {
        if final_bump.is_bump() || !self.options.bump_unchanged {
            return final_bump;
        }
        match self.scope {
            UnchangedScope::All => BumpSeverity::Patch,
            UnchangedScope::ChangedDependencies if dependency_changed => BumpSeverity::Patch,
            UnchangedScope::ChangedDependencies => BumpSeverity::None,
        }
    }

    /// Compute the result for one module.
    ///
    /// `induced_by` is left empty; the caller owns propagation lineage.
    #[instrument(skip_all, fields(module = %module.id, %final_bump))]
    pub fn calculate(
        &self,
        module: &Module,
        final_bump: BumpSeverity,
        dependency_changed: bool,
    ) -> VersionResult<ModuleChangeResult> {
        let bump = self.applied(final_bump, dependency_changed);
        let to = if bump.is_bump() {
            self.next(module.current_version.as_deref(), bump)?.to_string()
        } else {
            module
                .current_version
                .clone()
                .unwrap_or_else(|| Version::new(0, 0, 0).to_string())
        };

        if bump.is_bump() {
            debug!(from = ?module.current_version, %to, %bump, "version calculated");
        }
        Ok(ModuleChangeResult {
            id: module.id.clone(),
            path: module.path.clone(),
            from: module.current_version.clone(),
            to,
            bump,
            induced_by: BTreeSet::new(),
        })
    }

    /// Next version for `current` under `bump`, modifiers included.
    pub fn next(&self, current: Option<&str>, bump: BumpSeverity) -> VersionResult<Version> {
        let current = current.map(parse_version).transpose()?;
        let release = current
            .as_ref()
            .map_or_else(|| Version::new(0, 0, 0), |v| Version::new(v.major, v.minor, v.patch));

        let pending = current
            .as_ref()
            .is_some_and(|v| !v.pre.is_empty() && !is_snapshot(&v.pre));
        let mut next = if pending && satisfies(&release, bump) {
            release
        } else {
            next_version(&release, bump)?
        };

        if self.options.prerelease_mode {
            self.options.validate()?;
            let counter = self.prerelease_counter(current.as_ref(), &next)?;
            next.pre = prerelease(&format!("{}.{counter}", self.options.prerelease_id))?;
        } else if self.options.append_snapshot {
            next.pre = prerelease(SNAPSHOT)?;
        }

        if self.options.add_build_metadata {
            match &self.context.build_metadata {
                Some(metadata) => {
                    next.build = BuildMetadata::new(metadata)
                        .map_err(|_| VersionError::InvalidBuildMetadata(metadata.clone()))?;
                }
                None => debug!("build metadata requested but none available"),
            }
        }
        Ok(next)
    }

    fn prerelease_counter(&self, current: Option<&Version>, base: &Version) -> VersionResult<String> {
        if self.options.timestamp_versions {
            return Ok(self.context.timestamp.format(TIMESTAMP_FORMAT).to_string());
        }
        let previous = current
            .filter(|v| v.major == base.major && v.minor == base.minor && v.patch == base.patch)
            .and_then(|v| {
                let (id, counter) = v.pre.as_str().rsplit_once('.')?;
                (id == self.options.prerelease_id)
                    .then(|| counter.parse::<u64>().ok())
                    .flatten()
                    .map(|k| (v, k))
            });
        match previous {
            None => Ok("0".to_string()),
            Some((v, k)) => k
                .checked_add(1)
                .map(|n| n.to_string())
                .ok_or_else(|| VersionError::Overflow { input: v.to_string() }),
        }
    }
}

/// Whether a pending release already carries an increment of `bump` size.
const fn satisfies(release: &Version, bump: BumpSeverity) -> bool {
    match bump {
        BumpSeverity::Major => release.minor == 0 && release.patch == 0,
        BumpSeverity::Minor => release.patch == 0,
        BumpSeverity::Patch | BumpSeverity::None => true,
    }
}

fn is_snapshot(pre: &Prerelease) -> bool {
    pre.as_str().eq_ignore_ascii_case(SNAPSHOT)
}

fn prerelease(text: &str) -> VersionResult<Prerelease> {
    Prerelease::new(text).map_err(|source| VersionError::InvalidSemver {
        input: text.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn context() -> ReleaseContext {
        ReleaseContext::at(Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap())
    }

    fn module(version: Option<&str>) -> Module {
        Module {
            id: ":lib".into(),
            path: "lib".into(),
            name: "lib".into(),
            kind: crate::registry::ModuleKind::Module,
            current_version: version.map(str::to_owned),
            declared_version: true,
            affects: BTreeSet::new(),
        }
    }

    fn next(options: &RunOptions, current: Option<&str>, bump: BumpSeverity) -> String {
        let ctx = context().with_build_metadata("abc1234");
        VersionCalculator::new(options, UnchangedScope::All, &ctx)
            .next(current, bump)
            .unwrap()
            .to_string()
    }

    #[test]
    fn increments_follow_semver() {
        let opts = RunOptions::default();
        assert_eq!(next(&opts, Some("1.2.3"), BumpSeverity::Patch), "1.2.4");
        assert_eq!(next(&opts, Some("1.2.3"), BumpSeverity::Minor), "1.3.0");
        assert_eq!(next(&opts, Some("1.2.3"), BumpSeverity::Major), "2.0.0");
    }

    #[test]
    fn parse_with_v_prefix() {
        assert_eq!(parse_version("v1.2.3").unwrap(), Version::new(1, 2, 3));
        assert!(matches!(
            parse_version("not-a-version"),
            Err(VersionError::InvalidSemver { input, .. }) if input == "not-a-version"
        ));
    }

    #[test]
    fn maxed_component_is_an_error() {
        let top = u64::MAX;
        let opts = RunOptions::default();
        let ctx = context();
        let calc = VersionCalculator::new(&opts, UnchangedScope::All, &ctx);

        let err = calc.next(Some(&format!("1.2.{top}")), BumpSeverity::Patch).unwrap_err();
        assert!(matches!(err, VersionError::Overflow { input } if input == format!("1.2.{top}")));
        assert!(calc.next(Some(&format!("1.{top}.0")), BumpSeverity::Minor).is_err());
        assert!(calc.next(Some(&format!("{top}.0.0")), BumpSeverity::Major).is_err());
        // Only the bumped component matters.
        assert_eq!(
            next_version(&Version::new(1, top, 7), BumpSeverity::Major).unwrap(),
            Version::new(2, 0, 0)
        );
    }

    #[test]
    fn maxed_prerelease_counter_is_an_error() {
        let opts = RunOptions {
            prerelease_mode: true,
            ..RunOptions::default()
        };
        let ctx = context();
        let calc = VersionCalculator::new(&opts, UnchangedScope::All, &ctx);

        let current = format!("1.1.0-alpha.{}", u64::MAX);
        let err = calc.next(Some(&current), BumpSeverity::Patch).unwrap_err();
        assert!(matches!(err, VersionError::Overflow { input } if input == current));
    }

    #[test]
    fn absent_version_bumps_from_zero() {
        let opts = RunOptions::default();
        assert_eq!(next(&opts, None, BumpSeverity::Minor), "0.1.0");
    }

    #[test]
    fn unchanged_module_keeps_version() {
        let opts = RunOptions::default();
        let ctx = context();
        let calc = VersionCalculator::new(&opts, UnchangedScope::All, &ctx);
        let result = calc
            .calculate(&module(Some("2.3.0")), BumpSeverity::None, false)
            .unwrap();
        assert_eq!(result.from.as_deref(), Some("2.3.0"));
        assert_eq!(result.to, "2.3.0");
        assert!(!result.changed());

        let unversioned = calc.calculate(&module(None), BumpSeverity::None, false).unwrap();
        assert_eq!(unversioned.from, None);
        assert_eq!(unversioned.to, "0.0.0");
    }

    #[test]
    fn bump_unchanged_respects_scope() {
        let opts = RunOptions {
            bump_unchanged: true,
            ..RunOptions::default()
        };
        let ctx = context();

        let all = VersionCalculator::new(&opts, UnchangedScope::All, &ctx);
        let result = all.calculate(&module(Some("1.0.0")), BumpSeverity::None, false).unwrap();
        assert_eq!(result.to, "1.0.1");
        assert_eq!(result.bump, BumpSeverity::Patch);

        let scoped = VersionCalculator::new(&opts, UnchangedScope::ChangedDependencies, &ctx);
        assert_eq!(scoped.applied(BumpSeverity::None, false), BumpSeverity::None);
        assert_eq!(scoped.applied(BumpSeverity::None, true), BumpSeverity::Patch);
        assert_eq!(scoped.applied(BumpSeverity::Minor, false), BumpSeverity::Minor);
    }

    #[test]
    fn prerelease_counter_starts_at_zero() {
        let opts = RunOptions {
            prerelease_mode: true,
            ..RunOptions::default()
        };
        assert_eq!(next(&opts, Some("1.0.0"), BumpSeverity::Minor), "1.1.0-alpha.0");
    }

    #[test]
    fn prerelease_counter_continues_same_base() {
        let opts = RunOptions {
            prerelease_mode: true,
            ..RunOptions::default()
        };
        assert_eq!(
            next(&opts, Some("1.1.0-alpha.2"), BumpSeverity::Minor),
            "1.1.0-alpha.3"
        );
        assert_eq!(
            next(&opts, Some("1.1.0-alpha.2"), BumpSeverity::Patch),
            "1.1.0-alpha.3"
        );
        // a larger bump moves to a new base
        assert_eq!(
            next(&opts, Some("1.1.0-alpha.2"), BumpSeverity::Major),
            "2.0.0-alpha.0"
        );
        // other identifiers restart the counter
        assert_eq!(
            next(&opts, Some("1.1.0-beta.4"), BumpSeverity::Minor),
            "1.1.0-alpha.0"
        );
    }

    #[test]
    fn pending_prerelease_is_promoted() {
        let opts = RunOptions::default();
        assert_eq!(next(&opts, Some("1.1.0-alpha.2"), BumpSeverity::Patch), "1.1.0");
        assert_eq!(next(&opts, Some("1.1.1-rc.1"), BumpSeverity::Minor), "1.2.0");
    }

    #[test]
    fn timestamp_replaces_counter() {
        let opts = RunOptions {
            prerelease_mode: true,
            timestamp_versions: true,
            prerelease_id: "nightly".into(),
            ..RunOptions::default()
        };
        assert_eq!(
            next(&opts, Some("1.0.0"), BumpSeverity::Patch),
            "1.0.1-nightly.20240309140507"
        );

        let no_prerelease = RunOptions {
            timestamp_versions: true,
            ..RunOptions::default()
        };
        assert_eq!(next(&no_prerelease, Some("1.0.0"), BumpSeverity::Patch), "1.0.1");
    }

    #[test]
    fn snapshot_yields_to_prerelease() {
        let snapshot = RunOptions {
            append_snapshot: true,
            ..RunOptions::default()
        };
        assert_eq!(next(&snapshot, Some("1.0.0"), BumpSeverity::Patch), "1.0.1-SNAPSHOT");
        // a snapshot current version is a plain release base
        assert_eq!(
            next(&snapshot, Some("1.0.1-SNAPSHOT"), BumpSeverity::Patch),
            "1.0.2-SNAPSHOT"
        );

        let both = RunOptions {
            append_snapshot: true,
            prerelease_mode: true,
            ..RunOptions::default()
        };
        assert_eq!(next(&both, Some("1.0.0"), BumpSeverity::Patch), "1.0.1-alpha.0");
    }

    #[test]
    fn build_metadata_is_appended_last() {
        let opts = RunOptions {
            prerelease_mode: true,
            add_build_metadata: true,
            ..RunOptions::default()
        };
        assert_eq!(
            next(&opts, Some("1.0.0"), BumpSeverity::Major),
            "2.0.0-alpha.0+abc1234"
        );
    }

    #[test]
    fn build_metadata_without_context_is_skipped() {
        let opts = RunOptions {
            add_build_metadata: true,
            ..RunOptions::default()
        };
        let ctx = context();
        let calc = VersionCalculator::new(&opts, UnchangedScope::All, &ctx);
        assert_eq!(calc.next(Some("1.0.0"), BumpSeverity::Patch).unwrap().to_string(), "1.0.1");
    }

    #[test]
    fn invalid_build_metadata_is_rejected() {
        let opts = RunOptions {
            add_build_metadata: true,
            ..RunOptions::default()
        };
        let ctx = context().with_build_metadata("not valid!");
        let calc = VersionCalculator::new(&opts, UnchangedScope::All, &ctx);
        assert!(matches!(
            calc.next(Some("1.0.0"), BumpSeverity::Patch),
            Err(VersionError::InvalidBuildMetadata(meta)) if meta == "not valid!"
        ));
    }

    #[test]
    fn invalid_prerelease_id_is_rejected() {
        let opts = RunOptions {
            prerelease_mode: true,
            prerelease_id: "alpha.beta".into(),
            ..RunOptions::default()
        };
        assert!(opts.validate().is_err());
        let ctx = context();
        let calc = VersionCalculator::new(&opts, UnchangedScope::All, &ctx);
        assert!(matches!(
            calc.next(Some("1.0.0"), BumpSeverity::Patch),
            Err(VersionError::InvalidPrereleaseId(_))
        ));
    }

    #[test]
    fn invalid_current_version_only_matters_when_bumping() {
        let opts = RunOptions::default();
        let ctx = context();
        let calc = VersionCalculator::new(&opts, UnchangedScope::All, &ctx);
        let untouched = calc
            .calculate(&module(Some("unspecified")), BumpSeverity::None, false)
            .unwrap();
        assert_eq!(untouched.to, "unspecified");
        assert!(calc
            .calculate(&module(Some("unspecified")), BumpSeverity::Patch, false)
            .is_err());
    }

    #[test]
    fn result_serializes_camel_case() {
        let result = ModuleChangeResult {
            id: ":app".into(),
            path: "app".into(),
            from: Some("2.3.0".into()),
            to: "2.3.1".into(),
            bump: BumpSeverity::Patch,
            induced_by: [":core".to_string()].into(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["inducedBy"][0], ":core");
        assert_eq!(json["bump"], "patch");
    }
}
