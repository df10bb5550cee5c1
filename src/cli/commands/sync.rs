//! `sync` and `verify`.

use super::load_config;
use crate::cli::RuntimeConfig;
use crate::error::Result;
use crate::release::ensure_history;
use crate::sync::{self, SyncOutcome, WindowTitle};
use crate::version::VersionStore;

pub(super) fn run_sync(runtime: &RuntimeConfig, force: bool) -> Result<i32> {
    let config = load_config(runtime)?;
    let store = VersionStore::new(&config.version_file);
    let version = store.read_current_version()?;
    runtime.progress(&format!(
        "Version-of-record {} (configs use {})",
        version.tagged(),
        version.normalized()
    ))?;

    ensure_history(&store, &version, force)?;

    let mut failed = 0;
    for result in sync::apply(&version, &config.targets) {
        let previous = result.previous.as_deref().unwrap_or("?");
        match &result.outcome {
            SyncOutcome::Updated => runtime.success(&format!(
                "{}: {} -> {}",
                result.target,
                previous,
                version.normalized()
            ))?,
            SyncOutcome::Unchanged => {
                runtime.indent(&format!("{}: already {}", result.target, previous))?
            }
            SyncOutcome::Failed(e) => {
                failed += 1;
                runtime.warn(&format!("{}: {}", result.target, e))?;
            }
        }
    }

    let mismatches = sync::verify(&version, &config.targets);
    for mismatch in &mismatches {
        runtime.warn(&format!("still inconsistent: {}", mismatch))?;
    }

    if failed > 0 || !mismatches.is_empty() {
        runtime.error(&format!("{} config target(s) not in sync", failed.max(mismatches.len())))?;
        return Ok(1);
    }
    runtime.success("All config files in sync")?;
    Ok(0)
}

pub(super) fn run_verify(runtime: &RuntimeConfig) -> Result<i32> {
    let config = load_config(runtime)?;
    let store = VersionStore::new(&config.version_file);

    runtime.section("Version-of-record")?;
    let version = store.read_current_version()?;
    runtime.indent(&format!("{}: {}", store.path().display(), version.tagged()))?;

    runtime.section("Version history")?;
    let history = store.history()?;
    runtime.indent(&format!("{} entr{}", history.len(), if history.len() == 1 { "y" } else { "ies" }))?;
    for entry in history.iter().take(3) {
        runtime.verbose_println(&format!("   {} ({}) {}", entry.version.tagged(), entry.date, entry.notes))?;
    }
    if store.history_contains(&version)? {
        runtime.success(&format!("History has an entry for {}", version.tagged()))?;
    } else {
        runtime.warn(&format!("History has no entry for {}", version.tagged()))?;
    }

    let today = chrono::Local::now().date_naive();
    for entry in store.future_dated_entries(today)? {
        runtime.warn(&format!(
            "{} is dated {}, after today ({})",
            entry.version.tagged(),
            entry.date,
            today
        ))?;
    }

    runtime.section("Config files")?;
    let mismatches = sync::verify(&version, &config.targets);
    for target in &config.targets {
        match mismatches.iter().find(|m| m.target == target.name) {
            Some(mismatch) => runtime.warn(&mismatch.to_string())?,
            None => runtime.indent(&format!("✓ {}: {}", target.name, version.normalized()))?,
        }
    }

    let tauri_conf = config
        .targets
        .iter()
        .find(|t| t.path().file_name().is_some_and(|n| n == "tauri.conf.json"));
    if let Some(target) = tauri_conf {
        match sync::check_window_title(target.path(), &version) {
            Ok(Some(WindowTitle::Placeholder(title))) => {
                runtime.indent(&format!("✓ Window title has a version placeholder: {}", title))?
            }
            Ok(Some(WindowTitle::Versioned(title))) => {
                runtime.indent(&format!("✓ Window title: {}", title))?
            }
            Ok(Some(WindowTitle::Unversioned(title))) => runtime.warn(&format!(
                "Window title may not show the version: {}",
                title
            ))?,
            Ok(None) => {}
            Err(e) => runtime.warn(&format!("{}: {}", target.name, e))?,
        }
    }

    if mismatches.is_empty() {
        runtime.success("All config files match the version-of-record")?;
        Ok(0)
    } else {
        runtime.error(&format!(
            "{} config file(s) differ; run `release_sync sync`",
            mismatches.len()
        ))?;
        Ok(1)
    }
}
