//! `check-update`: what would the app's updater see?

use super::load_config;
use crate::cli::RuntimeConfig;
use crate::error::{CliError, Result};
use crate::updater::{ManifestSource, UpdateSource};
use crate::version::{Version, VersionStore};

pub(super) async fn run(runtime: &RuntimeConfig, manifest: &str, current: Option<&str>) -> Result<i32> {
    let running = match current {
        Some(text) => Version::parse_lenient(text).map_err(|e| CliError::InvalidArguments {
            reason: format!("--current {}: {}", text, e),
        })?,
        None => {
            let config = load_config(runtime)?;
            VersionStore::new(&config.version_file).read_current_version()?
        }
    };

    let payload = ManifestSource::new(manifest, running.clone()).check().await?;
    if payload.has_update {
        runtime.success(&format!("Update available: {} (running {})", payload.version, running))?;
    } else {
        runtime.progress(&format!("No update: manifest offers {} (running {})", payload.version, running))?;
    }

    runtime.output().data(&serde_json::to_string_pretty(&payload)?)?;
    Ok(0)
}
