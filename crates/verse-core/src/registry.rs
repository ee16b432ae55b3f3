//! Module registry: the module hierarchy and its affect-graph.
//!
//! Built once per run from the raw project information a build-system adapter
//! produces, then read-only. Modules are kept in lexicographic id order so
//! everything downstream iterates deterministically.
//!
//! # Example
//!
//! ```
//! use verse_core::registry::{ModuleRegistry, RawProjectInformation};
//!
//! let raw = RawProjectInformation::from_json(r#"{
//!     ":": { "path": ".", "type": "root", "name": "demo", "affectedModules": [":app"] },
//!     ":app": { "path": "app", "version": "1.0.0", "type": "module", "name": "app" }
//! }"#).unwrap();
//! let registry = ModuleRegistry::new(raw).unwrap();
//! assert!(registry.dependents_of(":").unwrap().contains(":app"));
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from registry construction and lookup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Lookup of a module id the registry does not hold.
    #[error("module '{0}' not found")]
    NotFound(String),

    /// A module lists an affected module that does not exist.
    #[error("module '{target}' not found (listed as affected by '{source_module}')")]
    DanglingAffect {
        /// The module whose affect set is broken.
        source_module: String,
        /// The missing id.
        target: String,
    },

    /// Adapter output could not be parsed.
    #[error("invalid project information: {0}")]
    Parse(String),
}

/// Result alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Position of a module in the hierarchy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    /// The repository root project.
    Root,
    /// Any other module.
    #[default]
    Module,
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => write!(f, "root"),
            Self::Module => write!(f, "module"),
        }
    }
}

/// Per-module record as supplied by a build-system adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawModuleInformation {
    /// Location relative to the repository root.
    pub path: String,
    /// Current version; absent for unversioned modules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Root or module.
    #[serde(rename = "type", default)]
    pub kind: ModuleKind,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Modules that are dependents of this one.
    #[serde(default)]
    pub affected_modules: BTreeSet<String>,
    /// Whether the version is declared explicitly in build files.
    #[serde(default)]
    pub declared_version: bool,
}

/// Raw adapter output: module id to module information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawProjectInformation {
    /// Modules keyed by id.
    pub modules: BTreeMap<String, RawModuleInformation>,
}

impl RawProjectInformation {
    /// Parse the JSON an adapter prints.
    pub fn from_json(json: &str) -> RegistryResult<Self> {
        serde_json::from_str(json).map_err(|e| RegistryError::Parse(e.to_string()))
    }

    /// Add one module, returning `self` for chaining.
    pub fn with_module(mut self, id: impl Into<String>, info: RawModuleInformation) -> Self {
        self.modules.insert(id.into(), info);
        self
    }
}

/// A node in the module hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Module {
    /// Stable identifier, unique within the registry (e.g. `:lib:core`).
    pub id: String,
    /// Location relative to the repository root.
    pub path: String,
    /// Display name.
    pub name: String,
    /// Root or module.
    pub kind: ModuleKind,
    /// Current version; `None` for unversioned or new modules.
    pub current_version: Option<String>,
    /// Whether the version is declared explicitly in build files.
    pub declared_version: bool,
    /// Ids of modules that depend on this one.
    pub affects: BTreeSet<String>,
}

/// Read-only module hierarchy for one run.
#[derive(Debug, Clone)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, Module>,
    affected_by: BTreeMap<String, BTreeSet<String>>,
}

impl ModuleRegistry {
    /// Build the registry, checking that every affect target exists.
    #[instrument(skip(raw), fields(modules = raw.modules.len()))]
    pub fn new(raw: RawProjectInformation) -> RegistryResult<Self> {
        for (id, info) in &raw.modules {
            if let Some(missing) = info
                .affected_modules
                .iter()
                .find(|target| !raw.modules.contains_key(*target))
            {
                return Err(RegistryError::DanglingAffect {
                    source_module: id.clone(),
                    target: missing.clone(),
                });
            }
        }

        let mut affected_by: BTreeMap<String, BTreeSet<String>> = raw
            .modules
            .keys()
            .map(|id| (id.clone(), BTreeSet::new()))
            .collect();
        for (id, info) in &raw.modules {
            for target in &info.affected_modules {
                if let Some(sources) = affected_by.get_mut(target) {
                    sources.insert(id.clone());
                }
            }
        }

        let modules = raw
            .modules
            .into_iter()
            .map(|(id, info)| {
                let module = Module {
                    id: id.clone(),
                    path: info.path,
                    name: info.name,
                    kind: info.kind,
                    current_version: info.version,
                    declared_version: info.declared_version,
                    affects: info.affected_modules,
                };
                (id, module)
            })
            .collect::<BTreeMap<_, _>>();

        debug!(count = modules.len(), "module registry built");
        Ok(Self {
            modules,
            affected_by,
        })
    }

    /// Look up a module by id.
    pub fn get(&self, id: &str) -> RegistryResult<&Module> {
        self.modules
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// All modules, ordered by id.
    pub fn all(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    /// All module ids, in order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Modules affected by a change to `id`.
    pub fn dependents_of(&self, id: &str) -> RegistryResult<&BTreeSet<String>> {
        self.get(id).map(|module| &module.affects)
    }

    /// Modules whose change affects `id` (the inverse of [`dependents_of`](Self::dependents_of)).
    pub fn dependencies_of(&self, id: &str) -> RegistryResult<&BTreeSet<String>> {
        self.affected_by
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Whether `id` is a registered module.
    pub fn contains(&self, id: &str) -> bool {
        self.modules.contains_key(id)
    }

    /// Number of modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// `true` when no modules are registered.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
