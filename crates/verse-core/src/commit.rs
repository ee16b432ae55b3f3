//! Commits attributed to a module.
//!
//! The engine never reads history itself. A commit-history provider hands it
//! [`CommitInfo`] values, either structured or as raw messages parsed with
//! [`CommitInfo::from_message`].

use serde::{Deserialize, Serialize};
use tracing::trace;

/// One commit attributable to a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitInfo {
    /// Declared commit type (e.g. `feat`), if the message had one.
    #[serde(rename = "type", default)]
    pub commit_type: Option<String>,
    /// Commit subject line.
    #[serde(default)]
    pub subject: String,
    /// Breaking changes force a major bump regardless of type.
    #[serde(default)]
    pub breaking_change: bool,
    /// Module the commit is attributed to.
    #[serde(default)]
    pub module_id: String,
}

impl CommitInfo {
    /// Build a structured commit.
    pub fn new(
        module_id: impl Into<String>,
        commit_type: Option<&str>,
        subject: impl Into<String>,
        breaking_change: bool,
    ) -> Self {
        Self {
            commit_type: commit_type.map(str::to_owned),
            subject: subject.into(),
            breaking_change,
            module_id: module_id.into(),
        }
    }

    /// Parse a full commit message as a conventional commit.
    ///
    /// Types are lowercased; `feat!:` and a `BREAKING CHANGE` footer both mark
    /// the commit as breaking. A message that is not a conventional commit
    /// yields no type and its first line as subject.
    pub fn from_message(module_id: impl Into<String>, message: &str) -> Self {
        let module_id = module_id.into();
        match git_conventional::Commit::parse(message.trim()) {
            Ok(parsed) => Self {
                commit_type: Some(parsed.type_().to_string().to_ascii_lowercase()),
                subject: parsed.description().to_string(),
                breaking_change: parsed.breaking(),
                module_id,
            },
            Err(err) => {
                trace!(%module_id, error = %err, "not a conventional commit");
                Self {
                    commit_type: None,
                    subject: message.lines().next().unwrap_or_default().trim().to_string(),
                    breaking_change: false,
                    module_id,
                }
            }
        }
    }
}

/// Commit as it arrives from a history provider.
///
/// Either a raw message, or an already structured commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommitRecord {
    /// Raw commit message.
    Message(String),
    /// Structured commit.
    Structured(CommitInfo),
}

impl CommitRecord {
    /// Resolve into a [`CommitInfo`] attributed to `module_id`.
    ///
    /// Structured commits without a module id inherit `module_id`.
    pub fn into_commit(self, module_id: &str) -> CommitInfo {
        match self {
            Self::Message(message) => CommitInfo::from_message(module_id, &message),
            Self::Structured(mut commit) => {
                if commit.module_id.is_empty() {
                    commit.module_id = module_id.to_string();
                }
                commit
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_conventional_message() {
        let commit = CommitInfo::from_message(":core", "feat(api): add endpoint");
        assert_eq!(commit.commit_type.as_deref(), Some("feat"));
        assert_eq!(commit.subject, "add endpoint");
        assert!(!commit.breaking_change);
        assert_eq!(commit.module_id, ":core");
    }

    #[test]
    fn bang_marks_breaking() {
        let commit = CommitInfo::from_message(":core", "fix!: drop legacy flag");
        assert_eq!(commit.commit_type.as_deref(), Some("fix"));
        assert!(commit.breaking_change);
    }

    #[test]
    fn footer_marks_breaking() {
        let message = "refactor: rename config\n\nBREAKING CHANGE: old keys are gone";
        let commit = CommitInfo::from_message(":core", message);
        assert!(commit.breaking_change);
    }

    #[test]
    fn type_is_lowercased() {
        let commit = CommitInfo::from_message(":core", "Feat: shout");
        assert_eq!(commit.commit_type.as_deref(), Some("feat"));
    }

    #[test]
    fn free_form_message_has_no_type() {
        let commit = CommitInfo::from_message(":app", "Update README\n\nmore words");
        assert_eq!(commit.commit_type, None);
        assert_eq!(commit.subject, "Update README");
        assert!(!commit.breaking_change);
    }

    #[test]
    fn structured_json_uses_camel_case() {
        let json = r#"{"type":"fix","subject":"x","breakingChange":true}"#;
        let commit: CommitInfo = serde_json::from_str(json).unwrap();
        assert_eq!(commit.commit_type.as_deref(), Some("fix"));
        assert!(commit.breaking_change);
        assert!(commit.module_id.is_empty());
    }

    #[test]
    fn records_resolve_both_forms() {
        let records: Vec<CommitRecord> = serde_json::from_str(
            r#"["feat: new thing", {"type":"chore","subject":"tidy","moduleId":":other"}]"#,
        )
        .unwrap();
        let commits: Vec<CommitInfo> = records
            .into_iter()
            .map(|r| r.into_commit(":lib"))
            .collect();

        assert_eq!(commits[0].commit_type.as_deref(), Some("feat"));
        assert_eq!(commits[0].module_id, ":lib");
        assert_eq!(commits[1].commit_type.as_deref(), Some("chore"));
        assert_eq!(commits[1].module_id, ":other");
    }
}
