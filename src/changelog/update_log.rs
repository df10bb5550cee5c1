//! Release sections prepended to the markdown update log.

use crate::error::Result;
use crate::version::Version;
use std::path::Path;

/// Title written when the log does not exist yet.
pub const DEFAULT_TITLE: &str = "# Update Log";

/// Returns `existing` with a `## vX.Y.Z` section inserted under its title.
///
/// The first line is kept as the title when it is a level-one heading;
/// otherwise [`DEFAULT_TITLE`] is added above the new section.
pub fn prepend_release(existing: Option<&str>, version: &Version, lines: &[String]) -> String {
    let (title, rest) = match existing {
        Some(text) if text.starts_with("# ") => match text.split_once('\n') {
            Some((title, rest)) => (title.to_string(), rest.trim_start_matches('\n').to_string()),
            None => (text.to_string(), String::new()),
        },
        Some(text) => (DEFAULT_TITLE.to_string(), text.to_string()),
        None => (DEFAULT_TITLE.to_string(), String::new()),
    };

    let body = lines
        .iter()
        .map(|l| if l.starts_with("- ") { l.clone() } else { format!("- {}", l) })
        .collect::<Vec<_>>()
        .join("\n");

    let mut out = format!("{}\n\n## {}\n\n{}\n", title, version.tagged(), body);
    if !rest.is_empty() {
        out.push('\n');
        out.push_str(&rest);
    }
    out
}

/// Prepends a release section to the log file at `path`, creating it if needed.
pub fn write_release(path: &Path, version: &Version, lines: &[String]) -> Result<()> {
    let existing = match std::fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };

    let created = existing.is_none();
    std::fs::write(path, prepend_release(existing.as_deref(), version, lines))?;
    if created {
        log::info!("Created update log {}", path.display());
    } else {
        log::info!("Updated update log {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_log_gets_title_and_section() {
        let out = prepend_release(None, &Version::new(1, 0, 3), &["fix crash (abc123)".into()]);
        assert_eq!(out, "# Update Log\n\n## v1.0.3\n\n- fix crash (abc123)\n");
    }

    #[test]
    fn section_goes_above_older_releases() {
        let existing = "# 更新日志\n\n## v1.0.2\n\n- old\n";
        let out = prepend_release(Some(existing), &Version::new(1, 0, 3), &["- new".into()]);
        assert_eq!(out, "# 更新日志\n\n## v1.0.3\n\n- new\n\n## v1.0.2\n\n- old\n");
    }

    #[test]
    fn written_log_parses_as_changelog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("UPDATE_LOG.md");
        write_release(&path, &Version::new(1, 0, 1), &["- [fix] one".into()]).unwrap();
        write_release(&path, &Version::new(1, 0, 2), &["- [feature] two".into()]).unwrap();

        let entries = crate::changelog::parse(&std::fs::read_to_string(&path).unwrap());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].version, "v1.0.2");
        assert_eq!(entries[1].changes[0].text, "one");
    }
}
