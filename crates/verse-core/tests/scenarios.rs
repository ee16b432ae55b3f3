//! End-to-end runs of the engine over small module graphs.

use std::collections::{BTreeSet, HashMap};

use chrono::{TimeZone, Utc};
use verse_core::propagate::PropagationError;
use verse_core::registry::RawProjectInformation;
use verse_core::{
    BumpError, BumpSeverity, CommitInfo, CommitTypeBump, ModuleChangeResult, ModuleRegistry,
    PolicyConfig, ReleaseContext, RunOptions, VersionBumper,
};

const CORE_AND_APP: &str = r#"{
    ":": {
        "path": ".",
        "type": "root",
        "name": "shop",
        "version": "3.0.0",
        "declaredVersion": true,
        "affectedModules": []
    },
    ":core": {
        "path": "core",
        "type": "module",
        "name": "core",
        "version": "1.0.0",
        "declaredVersion": true,
        "affectedModules": [":app"]
    },
    ":app": {
        "path": "app",
        "type": "module",
        "name": "app",
        "version": "2.3.0",
        "declaredVersion": true,
        "affectedModules": []
    }
}"#;

fn registry(json: &str) -> ModuleRegistry {
    ModuleRegistry::new(RawProjectInformation::from_json(json).unwrap()).unwrap()
}

fn context() -> ReleaseContext {
    ReleaseContext::at(Utc.with_ymd_and_hms(2025, 1, 31, 8, 0, 0).unwrap())
}

fn run(
    registry: &ModuleRegistry,
    commits: &[CommitInfo],
    policy: &PolicyConfig,
    options: RunOptions,
) -> Result<Vec<ModuleChangeResult>, BumpError> {
    let mut by_module: HashMap<String, Vec<CommitInfo>> = HashMap::new();
    for commit in commits {
        by_module
            .entry(commit.module_id.clone())
            .or_default()
            .push(commit.clone());
    }
    VersionBumper::new(registry, options).calculate_version_bumps(&by_module, policy, &context())
}

fn find<'a>(results: &'a [ModuleChangeResult], id: &str) -> &'a ModuleChangeResult {
    results.iter().find(|r| r.id == id).unwrap()
}

#[test]
fn feature_in_core_patches_app() {
    let registry = registry(CORE_AND_APP);
    let results = run(
        &registry,
        &[CommitInfo::new(":core", Some("feat"), "add pricing api", false)],
        &PolicyConfig::default(),
        RunOptions::default(),
    )
    .unwrap();

    let core = find(&results, ":core");
    assert_eq!(core.bump, BumpSeverity::Minor);
    assert_eq!(core.from.as_deref(), Some("1.0.0"));
    assert_eq!(core.to, "1.1.0");
    assert!(core.induced_by.is_empty());

    let app = find(&results, ":app");
    assert_eq!(app.bump, BumpSeverity::Patch);
    assert_eq!(app.to, "2.3.1");
    assert_eq!(app.induced_by, BTreeSet::from([":core".to_string()]));

    let root = find(&results, ":");
    assert!(!root.changed());
    assert_eq!(root.to, "3.0.0");
}

#[test]
fn breaking_fix_in_core_bumps_app_minor() {
    let registry = registry(CORE_AND_APP);
    let results = run(
        &registry,
        &[CommitInfo::from_message(
            ":core",
            "fix: change rounding\n\nBREAKING CHANGE: totals differ",
        )],
        &PolicyConfig::default(),
        RunOptions::default(),
    )
    .unwrap();

    let core = find(&results, ":core");
    assert_eq!(core.bump, BumpSeverity::Major);
    assert_eq!(core.to, "2.0.0");

    let app = find(&results, ":app");
    assert_eq!(app.bump, BumpSeverity::Minor);
    assert_eq!(app.to, "2.4.0");
}

#[test]
fn ignored_commit_leaves_module_untouched() {
    let registry = registry(CORE_AND_APP);
    let results = run(
        &registry,
        &[CommitInfo::new(":app", Some("docs"), "fix typo in readme", false)],
        &PolicyConfig::default(),
        RunOptions::default(),
    )
    .unwrap();

    let app = find(&results, ":app");
    assert_eq!(app.bump, BumpSeverity::None);
    assert_eq!(app.from.as_deref(), Some(app.to.as_str()));
    assert!(results.iter().all(|r| !r.changed()));
}

#[test]
fn mutual_affects_with_bumps_fail_the_run() {
    let registry = registry(
        r#"{
            ":a": { "path": "a", "version": "1.0.0", "affectedModules": [":b"] },
            ":b": { "path": "b", "version": "1.0.0", "affectedModules": [":a"] }
        }"#,
    );
    let err = run(
        &registry,
        &[
            CommitInfo::new(":a", Some("fix"), "one", false),
            CommitInfo::new(":b", Some("feat"), "two", false),
        ],
        &PolicyConfig::default(),
        RunOptions::default(),
    )
    .unwrap_err();

    match err {
        BumpError::Propagation(PropagationError::CyclicDependency { modules }) => {
            assert_eq!(modules, vec![":a".to_string(), ":b".to_string()]);
        }
        other => panic!("expected cyclic dependency, got {other:?}"),
    }
}

#[test]
fn results_are_identical_across_runs() {
    let registry = registry(CORE_AND_APP);
    let commits = [
        CommitInfo::new(":core", Some("perf"), "faster lookups", false),
        CommitInfo::new(":app", Some("feat"), "checkout page", false),
    ];
    let first = run(&registry, &commits, &PolicyConfig::default(), RunOptions::default()).unwrap();
    for _ in 0..5 {
        let again =
            run(&registry, &commits, &PolicyConfig::default(), RunOptions::default()).unwrap();
        assert_eq!(first, again);
    }
}

#[test]
fn prerelease_run_with_build_metadata() {
    let registry = registry(CORE_AND_APP);
    let options = RunOptions {
        prerelease_mode: true,
        prerelease_id: "beta".into(),
        add_build_metadata: true,
        ..RunOptions::default()
    };
    let mut by_module = HashMap::new();
    by_module.insert(
        ":core".to_string(),
        vec![CommitInfo::new(":core", Some("feat"), "x", false)],
    );
    let results = VersionBumper::new(&registry, options)
        .calculate_version_bumps(
            &by_module,
            &PolicyConfig::default(),
            &context().with_build_metadata("9f8e7d6"),
        )
        .unwrap();

    assert_eq!(find(&results, ":core").to, "1.1.0-beta.0+9f8e7d6");
    assert_eq!(find(&results, ":app").to, "2.3.1-beta.0+9f8e7d6");
    assert_eq!(find(&results, ":").to, "3.0.0");
}

#[test]
fn custom_commit_types_drive_classification() {
    let registry = registry(CORE_AND_APP);
    let mut policy = PolicyConfig::default();
    policy
        .commit_types
        .insert("security".into(), CommitTypeBump::Major);
    policy.default_bump = CommitTypeBump::Ignore;

    let results = run(
        &registry,
        &[
            CommitInfo::from_message(":app", "security: rotate keys"),
            CommitInfo::from_message(":core", "Merge branch 'main'"),
        ],
        &policy,
        RunOptions::default(),
    )
    .unwrap();

    assert_eq!(find(&results, ":app").to, "3.0.0");
    assert_eq!(find(&results, ":core").bump, BumpSeverity::None);
}

#[test]
fn unversioned_module_bumps_from_zero() {
    let registry = registry(
        r#"{
            ":new": { "path": "new", "affectedModules": [] }
        }"#,
    );
    let results = run(
        &registry,
        &[CommitInfo::new(":new", Some("feat"), "first", false)],
        &PolicyConfig::default(),
        RunOptions::default(),
    )
    .unwrap();

    assert_eq!(results[0].from, None);
    assert_eq!(results[0].to, "0.1.0");
}
