//! `release`: bump, record, sync, log, commit, tag, push.

use super::load_config;
use crate::cli::RuntimeConfig;
use crate::error::Result;
use crate::release::{ReleaseOptions, cut_release};
use crate::version::BumpKind;

pub(super) async fn run(runtime: &RuntimeConfig, kind: BumpKind, force: bool, push: bool) -> Result<i32> {
    let config = load_config(runtime)?;
    let today = chrono::Local::now().date_naive();

    runtime.section("Release")?;
    let summary = cut_release(
        runtime.root(),
        &config,
        ReleaseOptions { kind, force, push },
        today,
    )
    .await?;

    runtime.success(&format!(
        "Version {} -> {}",
        summary.previous.tagged(),
        summary.version.tagged()
    ))?;
    for result in &summary.synced {
        if result.is_ok() {
            runtime.indent(&format!("✓ {}", result.target))?;
        } else {
            runtime.warn(&format!("{} was not updated", result.target))?;
        }
    }
    runtime.verbose_println(&format!("Update log lines:\n{}", summary.notes.join("\n")))?;

    if summary.pushed {
        runtime.success(&format!("Released {}; pushed commit and tag", summary.version.tagged()))?;
    } else {
        runtime.success(&format!(
            "Released {} locally; push with `git push && git push origin {}`",
            summary.version.tagged(),
            summary.version.tagged()
        ))?;
    }
    Ok(0)
}
