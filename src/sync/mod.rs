//! Version propagation across config files.
//!
//! [`apply`] writes the normalized version (no `v` prefix) into every target
//! and records per-target outcomes; one missing field never stops the batch.
//! [`verify`] is the read-only counterpart used after a write or on its own
//! by the diagnostic command. There is no multi-file transaction: a failure
//! half-way leaves earlier targets updated, which `verify` reports.

mod target;

pub use target::{ConfigTarget, TargetFormat};

use crate::error::{ReleaseError, Result};
use crate::version::Version;
use std::path::{Path, PathBuf};

/// Outcome of writing one target.
#[derive(Debug)]
pub enum SyncOutcome {
    /// The field held another value and was rewritten
    Updated,
    /// The field already held the intended value
    Unchanged,
    /// The target could not be updated
    Failed(ReleaseError),
}

/// Per-target report from [`apply`].
#[derive(Debug)]
pub struct SyncResult {
    /// Target name
    pub target: String,
    /// Target file
    pub path: PathBuf,
    /// Value found before the write, if any
    pub previous: Option<String>,
    /// What happened
    pub outcome: SyncOutcome,
}

impl SyncResult {
    /// Whether the target now holds the intended value.
    pub fn is_ok(&self) -> bool {
        !matches!(self.outcome, SyncOutcome::Failed(_))
    }
}

/// A target whose value differs from the intended version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// Target name
    pub target: String,
    /// Target file
    pub path: PathBuf,
    /// Normalized version that was expected
    pub expected: String,
    /// Value found; `None` if missing or unreadable
    pub found: Option<String>,
}

impl std::fmt::Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.found {
            Some(found) => write!(f, "{}: {} != {}", self.target, found, self.expected),
            None => write!(f, "{}: version field not readable", self.target),
        }
    }
}

/// Writes `version` into every target.
pub fn apply(version: &Version, targets: &[ConfigTarget]) -> Vec<SyncResult> {
    let intended = version.normalized();

    targets
        .iter()
        .map(|target| {
            let result = target.read_value().and_then(|current| {
                if current == intended {
                    Ok((current, SyncOutcome::Unchanged))
                } else {
                    target
                        .write_value(&intended)
                        .map(|previous| (previous, SyncOutcome::Updated))
                }
            });

            match result {
                Ok((previous, outcome)) => {
                    match outcome {
                        SyncOutcome::Updated => log::info!(
                            "{}: {} -> {}",
                            target.name,
                            previous,
                            intended
                        ),
                        _ => log::debug!("{}: already {}", target.name, intended),
                    }
                    SyncResult {
                        target: target.name.clone(),
                        path: target.path.clone(),
                        previous: Some(previous),
                        outcome,
                    }
                }
                Err(e) => {
                    log::error!("{}: update failed: {}", target.name, e);
                    SyncResult {
                        target: target.name.clone(),
                        path: target.path.clone(),
                        previous: None,
                        outcome: SyncOutcome::Failed(e),
                    }
                }
            }
        })
        .collect()
}

/// Re-reads every target and reports those not holding `version`.
pub fn verify(version: &Version, targets: &[ConfigTarget]) -> Vec<Mismatch> {
    let expected = version.normalized();

    targets
        .iter()
        .filter_map(|target| {
            let found = match target.read_value() {
                Ok(value) => Some(value),
                Err(e) => {
                    log::warn!("{}: {}", target.name, e);
                    None
                }
            };

            if found.as_deref() == Some(expected.as_str()) {
                None
            } else {
                Some(Mismatch {
                    target: target.name.clone(),
                    path: target.path.clone(),
                    expected: expected.clone(),
                    found,
                })
            }
        })
        .collect()
}

/// First window title of a Tauri config, judged against the version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowTitle {
    /// Carries the `__VERSION__` placeholder filled in at build time
    Placeholder(String),
    /// Already names the version
    Versioned(String),
    /// Mentions neither
    Unversioned(String),
}

/// Title pointers for Tauri v1 and v2 configs.
const WINDOW_TITLE_POINTERS: [&str; 2] = ["/tauri/windows/0/title", "/app/windows/0/title"];

/// Checks the first window title in `tauri_conf` for version information.
///
/// `None` when the file or the title is absent.
pub fn check_window_title(tauri_conf: &Path, version: &Version) -> Result<Option<WindowTitle>> {
    if !tauri_conf.is_file() {
        return Ok(None);
    }
    let doc: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(tauri_conf)?)?;
    let Some(title) = WINDOW_TITLE_POINTERS
        .iter()
        .find_map(|pointer| doc.pointer(pointer))
        .and_then(|v| v.as_str())
    else {
        return Ok(None);
    };

    let title = title.to_string();
    Ok(Some(if title.contains("__VERSION__") {
        WindowTitle::Placeholder(title)
    } else if title.contains(&version.normalized()) {
        WindowTitle::Versioned(title)
    } else {
        WindowTitle::Unversioned(title)
    }))
}
