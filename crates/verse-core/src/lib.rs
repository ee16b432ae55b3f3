//! Core library for verse.
//!
//! Dependency-aware semantic versioning for repositories that hold many
//! independently versioned modules. Given the commits attributed to each
//! module and the graph of which modules affect which, the engine decides
//! every module's next version.
//!
//! # Modules
//!
//! - [`severity`] - Bump severities and commit-type decisions
//! - [`policy`] - The configurable bump policy
//! - [`commit`] - Commits attributed to modules
//! - [`registry`] - Module hierarchy and affect-graph
//! - [`classify`] - Commit classification and own-bump aggregation
//! - [`propagate`] - Bump propagation across dependents
//! - [`version`] - Next-version calculation
//! - [`bumper`] - Run orchestration
//! - [`config`] - Configuration loading and management
//! - [`error`] - Configuration error types
//!
//! # Quick Start
//!
//! ```
//! use std::collections::HashMap;
//! use verse_core::{CommitInfo, ModuleRegistry, PolicyConfig, ReleaseContext, RunOptions, VersionBumper};
//! use verse_core::registry::RawProjectInformation;
//!
//! let raw = RawProjectInformation::from_json(r#"{
//!     ":core": { "path": "core", "version": "1.0.0", "affectedModules": [":app"] },
//!     ":app": { "path": "app", "version": "2.3.0" }
//! }"#).unwrap();
//! let registry = ModuleRegistry::new(raw).unwrap();
//!
//! let mut commits = HashMap::new();
//! commits.insert(":core".to_string(), vec![CommitInfo::from_message(":core", "feat: add api")]);
//!
//! let results = VersionBumper::new(&registry, RunOptions::default())
//!     .calculate_version_bumps(&commits, &PolicyConfig::default(), &ReleaseContext::now())
//!     .unwrap();
//! assert_eq!(results[0].to, "2.3.1");
//! assert_eq!(results[1].to, "1.1.0");
//! ```
#![deny(unsafe_code)]

pub mod bumper;

pub mod classify;

pub mod commit;

pub mod config;

pub mod error;

pub mod policy;

pub mod propagate;

pub mod registry;

pub mod severity;

pub mod version;

pub use bumper::{BumpError, BumpResult, VersionBumper};

pub use commit::{CommitInfo, CommitRecord};

pub use config::{Config, ConfigLoader, LogLevel};

pub use error::{ConfigError, ConfigResult};

pub use policy::{DependencyRules, PolicyConfig, PolicyError, UnchangedScope};

pub use propagate::{Propagation, PropagationError, Propagator};

pub use registry::{Module, ModuleKind, ModuleRegistry, RegistryError};

pub use severity::{BumpSeverity, CommitTypeBump};

pub use version::{ModuleChangeResult, ReleaseContext, RunOptions, VersionError};

// Re-export semver so downstream crates don't need a direct dependency.
pub use semver;
