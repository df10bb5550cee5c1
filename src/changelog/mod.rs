//! Changelog markdown parsing.
//!
//! The accepted format is deliberately small:
//!
//! ```text
//! ## v1.0.1 (2023-11-15)
//!
//! - [新功能] Auto update
//! - [修复] Theme menu placement
//! ```
//!
//! Parsing is a two-state line scan (no entry open / entry open). It never
//! fails: lines it does not understand are dropped.

pub mod update_log;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::LazyLock;

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^##\s+([vV]?\d+\.\d+\.\d+)(?:\s+\((\d{4}-\d{2}-\d{2})\))?").expect("static regex")
});

static CHANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-\s+\[(.+?)\]\s+(.+)$").expect("static regex"));

/// Category of a single change line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// New functionality
    Feature,
    /// Enhancement of existing behaviour
    Improvement,
    /// Bug fix
    Fix,
    /// Anything else
    Other,
}

impl ChangeKind {
    /// Maps a bracketed tag to a kind, first matching rule wins.
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.to_lowercase();
        if tag.contains("新功能") || tag.contains("feature") {
            Self::Feature
        } else if tag.contains("优化") || tag.contains("improvement") {
            Self::Improvement
        } else if tag.contains("修复") || tag.contains("fix") {
            Self::Fix
        } else {
            Self::Other
        }
    }

    /// Canonical tag used when rendering.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Feature => "feature",
            Self::Improvement => "improvement",
            Self::Fix => "fix",
            Self::Other => "other",
        }
    }
}

/// One change line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    /// Category
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    /// Description text
    pub text: String,
}

/// All changes released under one version header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangelogEntry {
    /// Version as spelled in the header (`v1.0.1` or `1.0.1`)
    pub version: String,
    /// Header date, or the parse date when the header has none
    pub date: NaiveDate,
    /// Changes in source order
    pub changes: Vec<Change>,
}

/// Parses `markdown`, dating undated headers with today's local date.
pub fn parse(markdown: &str) -> Vec<ChangelogEntry> {
    parse_with_date(markdown, chrono::Local::now().date_naive())
}

/// Parses `markdown`, dating undated headers with `today`.
pub fn parse_with_date(markdown: &str, today: NaiveDate) -> Vec<ChangelogEntry> {
    let mut entries = Vec::new();
    let mut open: Option<ChangelogEntry> = None;

    for line in markdown.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(caps) = HEADER_RE.captures(line) {
            if let Some(done) = open.take() {
                entries.push(done);
            }
            let date = caps
                .get(2)
                .and_then(|m| NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d").ok())
                .unwrap_or(today);
            open = Some(ChangelogEntry {
                version: caps[1].to_string(),
                date,
                changes: Vec::new(),
            });
            continue;
        }

        let Some(entry) = open.as_mut() else {
            continue;
        };

        if let Some(caps) = CHANGE_RE.captures(line) {
            entry.changes.push(Change {
                kind: ChangeKind::from_tag(&caps[1]),
                text: caps[2].trim().to_string(),
            });
        }
    }

    if let Some(done) = open {
        entries.push(done);
    }
    entries
}

/// Renders entries back to canonical markdown.
///
/// `parse_with_date(&render(&entries), _)` yields `entries` again.
pub fn render(entries: &[ChangelogEntry]) -> String {
    let mut out = String::new();
    for (index, entry) in entries.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "## {} ({})", entry.version, entry.date.format("%Y-%m-%d"));
        out.push('\n');
        for change in &entry.changes {
            let _ = writeln!(out, "- [{}] {}", change.kind.tag(), change.text);
        }
    }
    out
}

/// Condenses release notes for a notification body.
///
/// Keeps the first `max_lines` non-empty lines that are not headings and
/// appends a marker when more were dropped. Empty notes yield a generic line.
pub fn summarize_notes(notes: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = notes
        .lines()
        .filter(|l| !l.trim().is_empty() && !l.starts_with('#'))
        .collect();

    if lines.is_empty() {
        return "A new version is available".to_string();
    }

    let mut summary = lines[..lines.len().min(max_lines)].join("\n");
    if lines.len() > max_lines {
        summary.push_str("\n...(more changes)");
    }
    summary
}
