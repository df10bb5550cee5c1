//! Cutting a release: bump, record, sync, log, tag, push.

mod git;

pub use git::Git;

use crate::changelog::update_log;
use crate::config::ReleaseConfig;
use crate::error::{CliError, ReleaseError, Result};
use crate::sync::{self, SyncResult};
use crate::version::{BumpKind, Version, VersionHistoryEntry, VersionStore};
use chrono::NaiveDate;
use std::path::Path;

/// Commits read for the update log; only the newest few are kept.
const COMMITS_READ: usize = 10;
const COMMITS_KEPT: usize = 5;

/// Options for [`cut_release`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReleaseOptions {
    /// Which component to bump
    pub kind: BumpKind,
    /// Proceed even if the current version has no history entry
    pub force: bool,
    /// Push the commit and tag
    pub push: bool,
}

/// What a release run did.
#[derive(Debug)]
pub struct ReleaseSummary {
    /// Version before the bump
    pub previous: Version,
    /// Version released
    pub version: Version,
    /// Update log lines taken from git history
    pub notes: Vec<String>,
    /// Per-target sync results
    pub synced: Vec<SyncResult>,
    /// Whether the commit and tag were pushed
    pub pushed: bool,
}

/// Refuses to continue when `version` has no history entry, unless forced.
///
/// # Errors
///
/// `CliError::InvalidArguments` naming the missing version.
pub fn ensure_history(store: &VersionStore, version: &Version, force: bool) -> Result<()> {
    if store.history_contains(version)? {
        return Ok(());
    }

    log::warn!(
        "VERSION_HISTORY in {} has no entry for {}",
        store.path().display(),
        version.tagged()
    );
    if force {
        log::warn!("Continuing because --force was given");
        return Ok(());
    }
    Err(ReleaseError::Cli(CliError::InvalidArguments {
        reason: format!(
            "add a VERSION_HISTORY entry for '{}' or rerun with --force",
            version.tagged()
        ),
    }))
}

/// Runs the release flow for the project at `root`.
pub async fn cut_release(
    root: &Path,
    config: &ReleaseConfig,
    options: ReleaseOptions,
    today: NaiveDate,
) -> Result<ReleaseSummary> {
    let git = Git::new(root);
    if !git.is_clean().await? {
        return Err(ReleaseError::Cli(CliError::ExecutionFailed {
            command: "release".into(),
            reason: "working tree has uncommitted changes; commit or stash them first".into(),
        }));
    }

    let store = VersionStore::new(&config.version_file);
    let previous = store.read_current_version()?;
    ensure_history(&store, &previous, options.force)?;

    let version = previous.bump(options.kind);
    log::info!("Releasing {} -> {}", previous.tagged(), version.tagged());

    let mut notes = git.recent_commits(COMMITS_READ).await?;
    notes.truncate(COMMITS_KEPT);

    store.write_current_version(&version)?;
    store.append_history_entry(&VersionHistoryEntry {
        version: version.clone(),
        date: today,
        notes: notes
            .iter()
            .map(|n| n.trim_start_matches("- "))
            .collect::<Vec<_>>()
            .join("; "),
    })?;

    let synced = sync::apply(&version, &config.targets);
    for result in synced.iter().filter(|r| !r.is_ok()) {
        log::warn!("Config target {} was not updated", result.target);
    }

    update_log::write_release(&config.update_log, &version, &notes)?;

    let mut staged = vec![config.version_file.as_path(), config.update_log.as_path()];
    staged.extend(
        config
            .targets
            .iter()
            .map(|t| t.path())
            .filter(|p| p.exists()),
    );
    git.add(&staged).await?;

    let tag = version.tagged();
    git.commit(&format!("chore: release {}", tag)).await?;
    git.tag(&tag, &format!("Release {}", tag)).await?;
    log::info!("✓ Tagged {}", tag);

    if options.push {
        git.push().await?;
        git.push_tag(&tag).await?;
        log::info!("✓ Pushed {} to origin", tag);
    }

    Ok(ReleaseSummary {
        previous,
        version: version.clone(),
        notes,
        synced,
        pushed: options.push,
    })
}
