//! Command handlers.
//!
//! Each handler returns the process exit code; errors that should abort the
//! command propagate as `ReleaseError`.

mod changelog;
mod release;
mod sign;
mod sync;
mod update;

use super::{Command, RuntimeConfig};
use crate::config::ReleaseConfig;
use crate::error::Result;

/// Dispatches `command`.
pub async fn execute(command: &Command, runtime: &RuntimeConfig) -> Result<i32> {
    match command {
        Command::Release { kind, force, no_push } => {
            release::run(runtime, *kind, *force, !*no_push).await
        }
        Command::Sync { force } => sync::run_sync(runtime, *force),
        Command::Verify => sync::run_verify(runtime),
        Command::SignManifest {
            manifest,
            key,
            passphrase,
        } => sign::sign_manifest(runtime, manifest, key, passphrase.clone()).await,
        Command::SignArtifacts {
            manifest,
            key,
            passphrase,
        } => sign::sign_artifacts(runtime, manifest, key.as_deref(), passphrase.clone()).await,
        Command::Changelog { file } => changelog::run(runtime, file),
        Command::CheckUpdate { manifest, current } => {
            update::run(runtime, manifest, current.as_deref()).await
        }
    }
}

fn load_config(runtime: &RuntimeConfig) -> Result<ReleaseConfig> {
    let config = ReleaseConfig::load(runtime.root(), runtime.config_path())?;
    runtime.verbose_println(&format!(
        "Version file: {}",
        config.version_file.display()
    ))?;
    Ok(config)
}
