//! `sign-manifest` and `sign-artifacts`.

use super::load_config;
use crate::cli::RuntimeConfig;
use crate::config::ReleaseConfig;
use crate::error::{CliError, ReleaseError, Result};
use crate::locator::ArtifactLocator;
use crate::manifest::ManifestStore;
use crate::pipeline::{ArtifactOutcome, BatchReport, SigningPipeline};
use crate::signing::{KeyMaterial, SignerChain, sha256_hex};
use std::path::Path;

pub(super) async fn sign_manifest(
    runtime: &RuntimeConfig,
    manifest: &Path,
    key: &Path,
    passphrase: Option<String>,
) -> Result<i32> {
    let config = load_config(runtime)?;
    let pipeline = pipeline(&config, manifest, KeyMaterial::new(key, passphrase)).await?;

    runtime.section(&format!("Signing platforms in {}", manifest.display()))?;
    let report = pipeline.sign_manifest_entries().await?;
    pipeline.store().persist().await?;

    finish(runtime, &report, manifest)
}

pub(super) async fn sign_artifacts(
    runtime: &RuntimeConfig,
    manifest: &Path,
    key: Option<&Path>,
    passphrase: Option<String>,
) -> Result<i32> {
    let config = load_config(runtime)?;
    require_manifest(manifest)?;

    let locator = ArtifactLocator::from_config(&config)?;
    let installers = locator.find_installers()?;
    if installers.is_empty() {
        runtime.error(&format!(
            "No installer files found in {}",
            config
                .build_dirs
                .iter()
                .map(|d| d.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))?;
        return Ok(1);
    }
    for installer in &installers {
        let digest = sha256_hex(installer).await?;
        runtime.indent(&format!("Found {} (sha256 {})", installer.display(), digest))?;
    }

    let Some(key) = key else {
        runtime.warn("No private key given; skipping signing, manifest left unchanged")?;
        return Ok(0);
    };

    let pipeline = pipeline(&config, manifest, KeyMaterial::new(key, passphrase)).await?;
    runtime.section("Signing installers")?;
    let report = pipeline.sign_local_installers().await?;

    finish(runtime, &report, manifest)
}

fn require_manifest(manifest: &Path) -> Result<()> {
    if manifest.is_file() {
        Ok(())
    } else {
        Err(ReleaseError::Cli(CliError::MissingArgument {
            argument: format!("manifest file {}", manifest.display()),
        }))
    }
}

async fn pipeline(config: &ReleaseConfig, manifest: &Path, key: KeyMaterial) -> Result<SigningPipeline> {
    require_manifest(manifest)?;
    let store = ManifestStore::load(manifest, config.latest_manifest.clone()).await?;

    Ok(SigningPipeline::new(
        ArtifactLocator::from_config(config)?,
        SignerChain::with_defaults(config.signer.clone()),
        store,
        key,
        config.match_mode,
    ))
}

fn finish(runtime: &RuntimeConfig, report: &BatchReport, manifest: &Path) -> Result<i32> {
    for artifact in &report.artifacts {
        match &artifact.outcome {
            ArtifactOutcome::Signed { matched: 0 } => runtime.warn(&format!(
                "{}: signed, but no platform entry references it",
                artifact.label
            ))?,
            ArtifactOutcome::Signed { matched } => runtime.success(&format!(
                "{}: signature injected into {} entr{}",
                artifact.label,
                matched,
                if *matched == 1 { "y" } else { "ies" }
            ))?,
            ArtifactOutcome::Skipped(reason) => {
                runtime.indent(&format!("{}: skipped ({})", artifact.label, reason))?
            }
            ArtifactOutcome::Failed(e) => runtime.error(&format!("{}: {}", artifact.label, e))?,
        }
    }

    if report.is_success() {
        runtime.success(&format!(
            "Updated {} ({} signed, {} failed)",
            manifest.display(),
            report.completed(),
            report.failed()
        ))?;
        Ok(0)
    } else {
        runtime.error("No artifact was signed and injected")?;
        Ok(1)
    }
}
