//! Bump propagation over the affect-graph.
//!
//! A module inherits a severity from each changed dependency through the
//! [`DependencyRules`], and ends up with the maximum of its own bump and
//! everything it inherits.
//!
//! # Ordering
//!
//! [`Propagator::new`] condenses the affect-graph into strongly connected
//! components and groups them into batches by depth: every dependency of a
//! component in batch `n` lives in a batch before `n`. Batches run in order;
//! components inside a batch are independent and are resolved in parallel,
//! then merged in id order, so the result never depends on scheduling.
//!
//! # Cycles
//!
//! A component with more than one module (or a module that affects itself)
//! is a cycle. A cycle that carries an active bump, either from a member's own
//! commits or induced from outside, has no well-defined resolution and fails
//! with [`PropagationError::CyclicDependency`]. An inert cycle stays `none`.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use petgraph::Direction;
use petgraph::algo::{condensation, toposort};
use petgraph::graph::DiGraph;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::policy::DependencyRules;
use crate::registry::{ModuleRegistry, RegistryError};
use crate::severity::BumpSeverity;

/// Errors from propagation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PropagationError {
    /// A cycle among modules with active bumps.
    #[error("cyclic dependency between modules: {}", .modules.join(", "))]
    CyclicDependency {
        /// Ids in the cycle, sorted.
        modules: Vec<String>,
    },

    /// A bump was supplied for a module the registry does not hold.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Result alias for propagation.
pub type PropagationResult<T> = Result<T, PropagationError>;

/// Outcome of one propagation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Propagation {
    /// Final severity per module.
    pub final_bumps: BTreeMap<String, BumpSeverity>,
    /// Dependencies whose contribution raised a module above its own bump.
    ///
    /// Every maximal contributor is listed. Empty when the module kept its own bump.
    pub induced_by: BTreeMap<String, BTreeSet<String>>,
    /// Dependencies that ended with a final severity above `none`.
    pub changed_dependencies: BTreeMap<String, BTreeSet<String>>,
}

impl Propagation {
    /// Final severity of `id`; `none` for unknown ids.
    pub fn final_bump(&self, id: &str) -> BumpSeverity {
        self.final_bumps.get(id).copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Component {
    members: Vec<String>,
    cyclic: bool,
}

#[derive(Debug)]
struct Resolved {
    id: String,
    severity: BumpSeverity,
    induced_by: BTreeSet<String>,
    changed_dependencies: BTreeSet<String>,
}

/// Propagation order for one registry, computed once and reusable.
#[derive(Debug, Clone)]
pub struct Propagator<'a> {
    registry: &'a ModuleRegistry,
    batches: Vec<Vec<Component>>,
}

impl<'a> Propagator<'a> {
    /// Compute the batched topological order of `registry`.
    #[instrument(skip_all, fields(modules = registry.len()))]
    pub fn new(registry: &'a ModuleRegistry) -> Self {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let index: BTreeMap<&str, _> = registry
            .ids()
            .map(|id| (id, graph.add_node(id)))
            .collect();

        let mut self_affecting = BTreeSet::new();
        for module in registry.all() {
            for target in &module.affects {
                if *target == module.id {
                    self_affecting.insert(module.id.as_str());
                    continue;
                }
                if let (Some(&from), Some(&to)) =
                    (index.get(module.id.as_str()), index.get(target.as_str()))
                {
                    graph.add_edge(from, to, ());
                }
            }
        }

        let condensed = condensation(graph, true);
        // The condensation is acyclic, so the sort cannot fail.
        let order = toposort(&condensed, None).unwrap_or_default();

        let mut depth = vec![0usize; condensed.node_count()];
        for &node in &order {
            depth[node.index()] = condensed
                .neighbors_directed(node, Direction::Incoming)
                .map(|pred| depth[pred.index()] + 1)
                .max()
                .unwrap_or(0);
        }

        let levels = depth.iter().max().map_or(0, |deepest| deepest + 1);
        let mut batches: Vec<Vec<Component>> = vec![Vec::new(); levels];
        for node in condensed.node_indices() {
            let mut members: Vec<String> = condensed[node].iter().map(|id| (*id).to_string()).collect();
            members.sort();
            let cyclic =
                members.len() > 1 || members.iter().any(|id| self_affecting.contains(id.as_str()));
            batches[depth[node.index()]].push(Component { members, cyclic });
        }
        for batch in &mut batches {
            batch.sort_by(|a, b| a.members.cmp(&b.members));
        }

        debug!(levels, "propagation order computed");
        Self { registry, batches }
    }

    /// Module ids grouped into batches of mutually independent modules.
    pub fn batches(&self) -> Vec<Vec<&str>> {
        self.batches
            .iter()
            .map(|batch| {
                batch
                    .iter()
                    .flat_map(|component| component.members.iter().map(String::as_str))
                    .collect()
            })
            .collect()
    }

    /// Resolve final severities from per-module own bumps.
    ///
    /// Modules absent from `own_bumps` start at `none`.
    #[instrument(skip_all, fields(batches = self.batches.len()))]
    pub fn propagate(
        &self,
        own_bumps: &BTreeMap<String, BumpSeverity>,
        rules: &DependencyRules,
    ) -> PropagationResult<Propagation> {
        if let Some(unknown) = own_bumps.keys().find(|id| !self.registry.contains(id)) {
            return Err(RegistryError::NotFound(unknown.clone()).into());
        }

        let mut propagation = Propagation {
            final_bumps: self
                .registry
                .ids()
                .map(|id| (id.to_string(), own_bumps.get(id).copied().unwrap_or_default()))
                .collect(),
            ..Propagation::default()
        };

        for batch in &self.batches {
            let outcomes: Vec<PropagationResult<Vec<Resolved>>> = batch
                .par_iter()
                .map(|component| self.resolve(component, &propagation.final_bumps, rules))
                .collect();

            for outcome in outcomes {
                for resolved in outcome? {
                    propagation
                        .final_bumps
                        .insert(resolved.id.clone(), resolved.severity);
                    propagation
                        .changed_dependencies
                        .insert(resolved.id.clone(), resolved.changed_dependencies);
                    propagation
                        .induced_by
                        .insert(resolved.id, resolved.induced_by);
                }
            }
        }

        let elevated = propagation
            .induced_by
            .values()
            .filter(|sources| !sources.is_empty())
            .count();
        info!(elevated, "propagation complete");
        Ok(propagation)
    }

    /// Resolve one component against the severities finalized so far.
    fn resolve(
        &self,
        component: &Component,
        finalized: &BTreeMap<String, BumpSeverity>,
        rules: &DependencyRules,
    ) -> PropagationResult<Vec<Resolved>> {
        let mut resolved = Vec::with_capacity(component.members.len());
        let mut active = false;

        for id in &component.members {
            let own = finalized.get(id).copied().unwrap_or_default();
            let mut strongest = BumpSeverity::None;
            let mut contributors = BTreeSet::new();
            let mut changed = BTreeSet::new();

            let external = self
                .registry
                .dependencies_of(id)?
                .iter()
                .filter(|dep| !component.members.contains(dep));
            for dep in external {
                let dep_bump = finalized.get(dep).copied().unwrap_or_default();
                if !dep_bump.is_bump() {
                    continue;
                }
                changed.insert(dep.clone());

                let induced = rules.induced_by(dep_bump);
                match induced.cmp(&strongest) {
                    Ordering::Greater => {
                        strongest = induced;
                        contributors.clear();
                        contributors.insert(dep.clone());
                    }
                    Ordering::Equal if induced.is_bump() => {
                        contributors.insert(dep.clone());
                    }
                    _ => {}
                }
            }

            active |= own.is_bump() || strongest.is_bump();
            let (severity, induced_by) = if strongest > own {
                debug!(module = %id, %own, induced = %strongest, sources = ?contributors, "bump induced by dependencies");
                (strongest, contributors)
            } else {
                (own, BTreeSet::new())
            };

            resolved.push(Resolved {
                id: id.clone(),
                severity,
                induced_by,
                changed_dependencies: changed,
            });
        }

        if component.cyclic && active {
            return Err(PropagationError::CyclicDependency {
                modules: component.members.clone(),
            });
        }
        Ok(resolved)
    }
}

/// One-shot propagation: compute the order and resolve in a single call.
pub fn propagate(
    registry: &ModuleRegistry,
    own_bumps: &BTreeMap<String, BumpSeverity>,
    rules: &DependencyRules,
) -> PropagationResult<Propagation> {
    Propagator::new(registry).propagate(own_bumps, rules)
}
