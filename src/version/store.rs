//! Version-of-record file access.
//!
//! The version-of-record is a source file holding two assignments:
//!
//! ```text
//! export const CURRENT_VERSION = 'v1.0.2';
//! export const VERSION_HISTORY = [
//!     { version: 'v1.0.2', date: '2024-01-10', notes: 'Improved updater' },
//!     ...
//! ];
//! ```
//!
//! It is read by pattern match, never by a structured parser, and every write
//! touches only the bytes of the literal being changed.

use super::{Version, VersionParseError};
use crate::error::{ReleaseError, Result};
use chrono::NaiveDate;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static CURRENT_VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"CURRENT_VERSION\s*=\s*['"]([^'"]+?)['"]"#).expect("static regex")
});

static HISTORY_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)VERSION_HISTORY\s*=\s*\[(.*?)\];").expect("static regex")
});

static HISTORY_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"VERSION_HISTORY\s*=\s*\[").expect("static regex"));

static ENTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)\{[^{}]*?version:\s*['"]([^'"]+)['"][^{}]*?\}"#).expect("static regex")
});

static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"date:\s*['"]([^'"]+)['"]"#).expect("static regex"));

static NOTES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"notes:\s*['"]([^'"]*)['"]"#).expect("static regex"));

static CHANGES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)changes:\s*\[(.*?)\]").expect("static regex"));

static STRING_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"['"]([^'"]*)['"]"#).expect("static regex"));

/// One recorded release in `VERSION_HISTORY`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct VersionHistoryEntry {
    /// Released version
    pub version: Version,
    /// Release date
    pub date: NaiveDate,
    /// Free-form notes (a `notes` field, or the `changes` list joined by newlines)
    pub notes: String,
}

/// Reader/writer for the version-of-record file.
#[derive(Debug, Clone)]
pub struct VersionStore {
    path: PathBuf,
}

impl VersionStore {
    /// Creates a store for the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the version-of-record file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<String> {
        std::fs::read_to_string(&self.path).map_err(|e| {
            ReleaseError::parse(&self.path, format!("cannot read version-of-record: {}", e))
        })
    }

    /// Reads `CURRENT_VERSION`.
    ///
    /// # Errors
    ///
    /// `ReleaseError::Parse` if the file is unreadable, has no assignment, or
    /// the value is not `vMAJOR.MINOR.PATCH`.
    pub fn read_current_version(&self) -> Result<Version> {
        let content = self.read()?;
        current_version_in(&content).map_err(|reason| ReleaseError::parse(&self.path, reason))
    }

    /// Whether `VERSION_HISTORY` records `version` (either quote style).
    pub fn history_contains(&self, version: &Version) -> Result<bool> {
        let content = self.read()?;
        Ok(history_block(&content)
            .map(|block| block_contains(block, version))
            .unwrap_or(false))
    }

    /// All well-formed history entries, in file order.
    ///
    /// Entries with an unparsable version or date are skipped with a warning.
    pub fn history(&self) -> Result<Vec<VersionHistoryEntry>> {
        let content = self.read()?;
        let block = history_block(&content).ok_or_else(|| {
            ReleaseError::parse(&self.path, "VERSION_HISTORY array not found")
        })?;
        Ok(parse_entries(block))
    }

    /// History entries dated after `today`.
    pub fn future_dated_entries(&self, today: NaiveDate) -> Result<Vec<VersionHistoryEntry>> {
        Ok(self
            .history()?
            .into_iter()
            .filter(|entry| entry.date > today)
            .collect())
    }

    /// Rewrites the `CURRENT_VERSION` literal, leaving every other byte intact.
    pub fn write_current_version(&self, version: &Version) -> Result<()> {
        let content = self.read()?;
        let span = CURRENT_VERSION_RE
            .captures(&content)
            .and_then(|caps| caps.get(1))
            .map(|m| m.range())
            .ok_or_else(|| ReleaseError::parse(&self.path, "CURRENT_VERSION assignment not found"))?;

        let mut updated = String::with_capacity(content.len());
        updated.push_str(&content[..span.start]);
        updated.push_str(&version.tagged());
        updated.push_str(&content[span.end..]);
        std::fs::write(&self.path, updated)?;
        log::info!("{}: CURRENT_VERSION set to {}", self.path.display(), version.tagged());
        Ok(())
    }

    /// Inserts `entry` at the head of `VERSION_HISTORY`.
    pub fn append_history_entry(&self, entry: &VersionHistoryEntry) -> Result<()> {
        let content = self.read()?;
        let open = HISTORY_OPEN_RE
            .find(&content)
            .ok_or_else(|| ReleaseError::parse(&self.path, "VERSION_HISTORY array not found"))?;

        let rendered = format!(
            "\n    {{\n        version: '{}',\n        date: '{}',\n        notes: '{}'\n    }},",
            entry.version.tagged(),
            entry.date.format("%Y-%m-%d"),
            entry.notes.replace('\\', "\\\\").replace('\'', "\\'").replace('\n', " ")
        );

        let mut updated = String::with_capacity(content.len() + rendered.len());
        updated.push_str(&content[..open.end()]);
        updated.push_str(&rendered);
        updated.push_str(&content[open.end()..]);
        std::fs::write(&self.path, updated)?;
        log::info!("{}: recorded {} in VERSION_HISTORY", self.path.display(), entry.version.tagged());
        Ok(())
    }
}

fn current_version_in(content: &str) -> std::result::Result<Version, String> {
    let raw = CURRENT_VERSION_RE
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| "CURRENT_VERSION assignment not found".to_string())?;
    Version::parse_tagged(raw).map_err(|e: VersionParseError| e.to_string())
}

fn history_block(content: &str) -> Option<&str> {
    HISTORY_BLOCK_RE
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn block_contains(block: &str, version: &Version) -> bool {
    let tagged = version.tagged();
    block.contains(&format!("version: '{}'", tagged))
        || block.contains(&format!("version: \"{}\"", tagged))
}

fn parse_entries(block: &str) -> Vec<VersionHistoryEntry> {
    let mut entries = Vec::new();

    for caps in ENTRY_RE.captures_iter(block) {
        let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        let raw_version = caps.get(1).map(|m| m.as_str()).unwrap_or_default();

        let Ok(version) = Version::parse_lenient(raw_version) else {
            log::warn!("Skipping history entry with invalid version '{}'", raw_version);
            continue;
        };

        let date = DATE_RE
            .captures(whole)
            .and_then(|c| c.get(1))
            .and_then(|m| NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d").ok());
        let Some(date) = date else {
            log::warn!("Skipping history entry {} without a valid date", raw_version);
            continue;
        };

        let notes = if let Some(notes) = NOTES_RE.captures(whole).and_then(|c| c.get(1)) {
            notes.as_str().to_string()
        } else if let Some(changes) = CHANGES_RE.captures(whole).and_then(|c| c.get(1)) {
            STRING_ITEM_RE
                .captures_iter(changes.as_str())
                .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
                .collect::<Vec<_>>()
                .join("\n")
        } else {
            String::new()
        };

        entries.push(VersionHistoryEntry {
            version,
            date,
            notes,
        });
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERSION_JS: &str = r#"// Application version
export const CURRENT_VERSION = 'v1.0.2';

export const VERSION_HISTORY = [
    {
        version: 'v1.0.2',
        date: '2024-01-10',
        notes: 'Improved updater'
    },
    {
        version: "v1.0.1",
        date: "2023-11-15",
        changes: ['Auto update', "Changelog viewer"]
    },
];
"#;

    fn store_with(content: &str) -> (tempfile::TempDir, VersionStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("version.js");
        std::fs::write(&path, content).unwrap();
        (dir, VersionStore::new(path))
    }

    #[test]
    fn reads_current_version() {
        let (_dir, store) = store_with(VERSION_JS);
        assert_eq!(store.read_current_version().unwrap(), Version::new(1, 0, 2));
    }

    #[test]
    fn rejects_untagged_current_version() {
        let (_dir, store) = store_with("export const CURRENT_VERSION = '1.0.2';");
        assert!(matches!(
            store.read_current_version(),
            Err(ReleaseError::Parse { .. })
        ));
    }

    #[test]
    fn missing_file_is_a_parse_error() {
        let store = VersionStore::new("/nonexistent/version.js");
        assert!(matches!(
            store.read_current_version(),
            Err(ReleaseError::Parse { .. })
        ));
    }

    #[test]
    fn history_lookup_ignores_quote_style() {
        let (_dir, store) = store_with(VERSION_JS);
        assert!(store.history_contains(&Version::new(1, 0, 2)).unwrap());
        assert!(store.history_contains(&Version::new(1, 0, 1)).unwrap());
        assert!(!store.history_contains(&Version::new(1, 0, 3)).unwrap());
    }

    #[test]
    fn parses_history_entries_with_notes_or_changes() {
        let (_dir, store) = store_with(VERSION_JS);
        let history = store.history().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].notes, "Improved updater");
        assert_eq!(history[1].version, Version::new(1, 0, 1));
        assert_eq!(history[1].notes, "Auto update\nChangelog viewer");
    }

    #[test]
    fn flags_future_dated_entries() {
        let (_dir, store) = store_with(VERSION_JS);
        let today = NaiveDate::from_ymd_opt(2023, 12, 1).unwrap();
        let future = store.future_dated_entries(today).unwrap();
        assert_eq!(future.len(), 1);
        assert_eq!(future[0].version, Version::new(1, 0, 2));
    }

    #[test]
    fn writes_current_version_in_place() {
        let (_dir, store) = store_with(VERSION_JS);
        store.write_current_version(&Version::new(1, 1, 0)).unwrap();

        let content = std::fs::read_to_string(store.path()).unwrap();
        assert!(content.contains("CURRENT_VERSION = 'v1.1.0';"));
        assert_eq!(
            content.replace("'v1.1.0';", "'v1.0.2';"),
            VERSION_JS,
            "only the literal may change"
        );
    }

    #[test]
    fn appended_entry_is_found_by_history_lookup() {
        let (_dir, store) = store_with(VERSION_JS);
        let entry = VersionHistoryEntry {
            version: Version::new(1, 0, 3),
            date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            notes: "Fix 'quoted' crash".into(),
        };
        store.append_history_entry(&entry).unwrap();

        assert!(store.history_contains(&entry.version).unwrap());
        let history = store.history().unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].version, Version::new(1, 0, 3));
    }
}
