//! Commit classification and own-bump aggregation.
//!
//! [`classify`] maps one commit to a severity, or to nothing when its type is
//! ignored. [`aggregate_own_bump`] reduces a module's commits to the single
//! severity its own history asks for.

use std::collections::{BTreeMap, HashMap};

use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::commit::CommitInfo;
use crate::policy::PolicyConfig;
use crate::registry::ModuleRegistry;
use crate::severity::BumpSeverity;

/// Classify a single commit.
///
/// Breaking changes are `major` unconditionally. Otherwise the commit type is
/// looked up in the policy table (falling back to the default bump); `None`
/// means the commit is ignored.
pub fn classify(commit: &CommitInfo, policy: &PolicyConfig) -> Option<BumpSeverity> {
    if commit.breaking_change {
        return Some(BumpSeverity::Major);
    }
    policy.bump_for_type(commit.commit_type.as_deref()).severity()
}

/// Reduce a module's commits to its own bump.
///
/// Ignored commits are dropped; the result is the maximum of the rest, or
/// `none` when nothing remains.
pub fn aggregate_own_bump(commits: &[CommitInfo], policy: &PolicyConfig) -> BumpSeverity {
    commits
        .iter()
        .filter_map(|commit| classify(commit, policy))
        .max()
        .unwrap_or_default()
}

/// Own bump for every module in the registry.
///
/// Modules missing from `module_commits` have no commits. Modules are
/// classified in parallel; the result is keyed and ordered by module id.
#[instrument(skip_all, fields(modules = registry.len()))]
pub fn aggregate_all(
    registry: &ModuleRegistry,
    module_commits: &HashMap<String, Vec<CommitInfo>>,
    policy: &PolicyConfig,
) -> BTreeMap<String, BumpSeverity> {
    let ids: Vec<&str> = registry.ids().collect();
    let own: BTreeMap<String, BumpSeverity> = ids
        .par_iter()
        .map(|id| {
            let bump = module_commits
                .get(*id)
                .map_or(BumpSeverity::None, |commits| aggregate_own_bump(commits, policy));
            ((*id).to_string(), bump)
        })
        .collect();

    for (id, bump) in own.iter().filter(|(_, bump)| bump.is_bump()) {
        debug!(module = %id, %bump, "own bump");
    }
    own
}
