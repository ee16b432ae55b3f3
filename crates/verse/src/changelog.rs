//! Root changelog summary.
//!
//! Writes one `## <date>` section listing every module whose version moves.
//! The section goes before the newest existing `## ` section, so the file
//! stays newest-first under its title.

use std::fs;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDate;
use tracing::{debug, instrument};
use verse_core::ModuleChangeResult;

/// File name of the root changelog.
pub const CHANGELOG_FILE: &str = "CHANGELOG.md";

const TITLE: &str = "# Changelog";

/// Render the summary section for one run.
///
/// Only changed modules are listed; `root_id` is shown as "Root".
pub fn render_section(results: &[ModuleChangeResult], date: NaiveDate, root_id: Option<&str>) -> String {
    let mut section = format!("## {}\n\n", date.format("%Y-%m-%d"));

    let changed: Vec<&ModuleChangeResult> = results.iter().filter(|r| r.changed()).collect();
    if changed.is_empty() {
        section.push_str("No changes in this release.\n");
        return section;
    }

    section.push_str("### Module Updates\n\n");
    for result in changed {
        let name = if Some(result.id.as_str()) == root_id {
            "Root"
        } else {
            result.id.as_str()
        };
        let from = result.from.as_deref().unwrap_or("none");
        section.push_str(&format!("- **{name}**: {from} → {}\n", result.to));
    }
    section
}

/// Insert `section` into existing changelog text.
pub fn insert_section(existing: &str, section: &str) -> String {
    let section = section.trim_end();
    let lines: Vec<&str> = existing.lines().collect();

    match lines
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, line)| line.starts_with("## "))
    {
        Some((index, _)) => {
            let (before, after) = lines.split_at(index);
            format!("{}\n{section}\n\n{}\n", before.join("\n"), after.join("\n"))
        }
        None if existing.trim().is_empty() => format!("{TITLE}\n\n{section}\n"),
        None => format!("{}\n\n{section}\n", existing.trim_end()),
    }
}

/// Write the summary into `<root>/CHANGELOG.md`, creating it if needed.
#[instrument(skip(results))]
pub fn write_root_changelog(
    root: &Utf8Path,
    results: &[ModuleChangeResult],
    date: NaiveDate,
    root_id: Option<&str>,
) -> anyhow::Result<Utf8PathBuf> {
    let path = root.join(CHANGELOG_FILE);
    let section = render_section(results, date, root_id);

    let updated = if path.is_file() {
        let existing =
            fs::read_to_string(&path).with_context(|| format!("failed to read {path}"))?;
        insert_section(&existing, &section)
    } else {
        format!("{TITLE}\n\n{section}")
    };

    fs::write(&path, updated).with_context(|| format!("failed to write {path}"))?;
    debug!(%path, "root changelog updated");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use verse_core::BumpSeverity;

    fn result(id: &str, from: Option<&str>, to: &str, bump: BumpSeverity) -> ModuleChangeResult {
        ModuleChangeResult {
            id: id.into(),
            path: id.trim_start_matches(':').into(),
            from: from.map(str::to_owned),
            to: to.into(),
            bump,
            induced_by: Default::default(),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, 14).unwrap()
    }

    #[test]
    fn section_lists_changed_modules_only() {
        let results = vec![
            result(":", Some("3.0.0"), "3.0.1", BumpSeverity::Patch),
            result(":app", Some("2.3.0"), "2.3.0", BumpSeverity::None),
            result(":core", None, "0.1.0", BumpSeverity::Minor),
        ];
        let section = render_section(&results, date(), Some(":"));
        assert_eq!(
            section,
            "## 2025-02-14\n\n### Module Updates\n\n- **Root**: 3.0.0 → 3.0.1\n- **:core**: none → 0.1.0\n"
        );
    }

    #[test]
    fn empty_run_says_so() {
        let section = render_section(&[], date(), None);
        assert_eq!(section, "## 2025-02-14\n\nNo changes in this release.\n");
    }

    #[test]
    fn inserts_before_newest_section() {
        let existing = "# Changelog\n\nIntro text.\n\n## 2024-12-01\n\n- old entry\n";
        let updated = insert_section(existing, "## 2025-02-14\n\nNo changes in this release.\n");
        assert_eq!(
            updated,
            "# Changelog\n\nIntro text.\n\n## 2025-02-14\n\nNo changes in this release.\n\n## 2024-12-01\n\n- old entry\n"
        );
    }

    #[test]
    fn appends_when_no_section_exists() {
        let updated = insert_section("# Changelog\n", "## 2025-02-14\n\nx\n");
        assert_eq!(updated, "# Changelog\n\n## 2025-02-14\n\nx\n");
    }

    #[test]
    fn writes_new_file_with_title() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        let results = vec![result(":core", Some("1.0.0"), "1.1.0", BumpSeverity::Minor)];

        let path = write_root_changelog(&root, &results, date(), None).unwrap();
        let contents = fs::read_to_string(path).unwrap();
        assert!(contents.starts_with("# Changelog\n\n## 2025-02-14\n"));
        assert!(contents.contains("- **:core**: 1.0.0 → 1.1.0"));
    }
}
