//! Run orchestration: commits in, per-module results out.
//!
//! [`VersionBumper::calculate_version_bumps`] validates the policy, classifies
//! every module's commits, propagates once across the whole registry, then
//! calculates each module's next version. Any failure aborts the run before a
//! single result is produced.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{info, instrument};

use crate::classify::aggregate_all;
use crate::commit::CommitInfo;
use crate::policy::{PolicyConfig, PolicyError};
use crate::propagate::{PropagationError, Propagator};
use crate::registry::{ModuleRegistry, RegistryError};
use crate::version::{ModuleChangeResult, ReleaseContext, RunOptions, VersionCalculator, VersionError};

/// Errors from a bump run.
#[derive(Error, Debug)]
pub enum BumpError {
    /// Unknown module id.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Policy rejected before the run started.
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// Propagation could not reach a fixed point.
    #[error(transparent)]
    Propagation(#[from] PropagationError),

    /// A version could not be calculated.
    #[error(transparent)]
    Version(#[from] VersionError),
}

/// Result alias for bump runs.
pub type BumpResult<T> = Result<T, BumpError>;

/// Computes version bumps for every module of one registry.
#[derive(Debug, Clone)]
pub struct VersionBumper<'a> {
    registry: &'a ModuleRegistry,
    propagator: Propagator<'a>,
    options: RunOptions,
}

impl<'a> VersionBumper<'a> {
    /// Prepare a bumper; the propagation order is computed here, once.
    pub fn new(registry: &'a ModuleRegistry, options: RunOptions) -> Self {
        Self {
            registry,
            propagator: Propagator::new(registry),
            options,
        }
    }

    /// Run options in effect.
    pub const fn options(&self) -> &RunOptions {
        &self.options
    }

    /// One result per registered module, in registry order.
    ///
    /// Modules missing from `module_commits` have no commits; commits keyed by
    /// an unknown id fail with [`RegistryError::NotFound`].
    #[instrument(skip_all, fields(modules = self.registry.len(), commits = module_commits.len()))]
    pub fn calculate_version_bumps(
        &self,
        module_commits: &HashMap<String, Vec<CommitInfo>>,
        policy: &PolicyConfig,
        context: &ReleaseContext,
    ) -> BumpResult<Vec<ModuleChangeResult>> {
        policy.validate()?;
        if self.options.prerelease_mode {
            self.options.validate()?;
        }

        let mut unknown: Vec<&String> = module_commits
            .keys()
            .filter(|id| !self.registry.contains(id))
            .collect();
        unknown.sort();
        if let Some(id) = unknown.first() {
            return Err(RegistryError::NotFound((*id).clone()).into());
        }

        let own_bumps = aggregate_all(self.registry, module_commits, policy);
        let mut propagation = self
            .propagator
            .propagate(&own_bumps, &policy.dependency_rules)?;

        let calculator = VersionCalculator::new(&self.options, policy.unchanged, context);
        let results = self
            .registry
            .all()
            .map(|module| {
                let dependency_changed = propagation
                    .changed_dependencies
                    .get(&module.id)
                    .is_some_and(|deps| !deps.is_empty());
                let mut result = calculator.calculate(
                    module,
                    propagation.final_bump(&module.id),
                    dependency_changed,
                )?;
                if let Some(sources) = propagation.induced_by.remove(&module.id) {
                    result.induced_by = sources;
                }
                Ok(result)
            })
            .collect::<BumpResult<Vec<_>>>()?;

        let changed = results.iter().filter(|r| r.changed()).count();
        info!(changed, total = results.len(), "version bumps calculated");
        Ok(results)
    }
}
