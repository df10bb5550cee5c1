//! Build-time signing batches.
//!
//! Each artifact runs locate → sign → inject as its own task. Artifacts share
//! only the [`ManifestStore`] and the download directory, and a failure in one
//! task never stops the others.

use crate::error::{ReleaseError, Result};
use crate::locator::ArtifactLocator;
use crate::manifest::{ManifestStore, MatchMode, PlatformEntry, url_basename};
use crate::signing::{KeyMaterial, SignerChain};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;

/// What happened to one artifact.
#[derive(Debug)]
pub enum ArtifactOutcome {
    /// Signed and injected into `matched` platform entries
    Signed {
        /// Entries whose signature was overwritten
        matched: usize,
    },
    /// Not attempted
    Skipped(String),
    /// Locate, sign or persist failed
    Failed(ReleaseError),
}

/// Per-artifact result line.
#[derive(Debug)]
pub struct ArtifactReport {
    /// Platform id or installer file name
    pub label: String,
    /// Local file that was signed, when one was resolved
    pub artifact: Option<PathBuf>,
    /// Result
    pub outcome: ArtifactOutcome,
}

impl ArtifactReport {
    /// Signed and referenced by at least one platform entry.
    pub fn is_complete(&self) -> bool {
        matches!(self.outcome, ArtifactOutcome::Signed { matched } if matched > 0)
    }
}

/// Results of one batch, in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// One report per artifact
    pub artifacts: Vec<ArtifactReport>,
}

impl BatchReport {
    /// Artifacts fully processed.
    pub fn completed(&self) -> usize {
        self.artifacts.iter().filter(|a| a.is_complete()).count()
    }

    /// Artifacts that failed.
    pub fn failed(&self) -> usize {
        self.artifacts
            .iter()
            .filter(|a| matches!(a.outcome, ArtifactOutcome::Failed(_)))
            .count()
    }

    /// A batch succeeds when at least one artifact was fully processed.
    pub fn is_success(&self) -> bool {
        self.completed() > 0
    }
}

/// Shared state for a signing batch.
#[derive(Clone)]
pub struct SigningPipeline {
    locator: ArtifactLocator,
    signer: Arc<SignerChain>,
    store: Arc<ManifestStore>,
    key: KeyMaterial,
    match_mode: MatchMode,
}

impl SigningPipeline {
    /// Creates a pipeline writing into `store`.
    pub fn new(
        locator: ArtifactLocator,
        signer: SignerChain,
        store: ManifestStore,
        key: KeyMaterial,
        match_mode: MatchMode,
    ) -> Self {
        Self {
            locator,
            signer: Arc::new(signer),
            store: Arc::new(store),
            key,
            match_mode,
        }
    }

    /// Manifest being updated.
    pub fn store(&self) -> &ManifestStore {
        &self.store
    }

    /// Signs the artifact behind every platform entry of the manifest.
    ///
    /// Entries without a url are skipped. Entries pointing at an artifact
    /// already scheduled are skipped too; the earlier task's injection covers
    /// them.
    pub async fn sign_manifest_entries(&self) -> Result<BatchReport> {
        let entries = self.store.snapshot().await.platforms();
        let mut slots: Vec<Option<ArtifactReport>> = Vec::with_capacity(entries.len());
        let mut scheduled = HashSet::new();
        let mut tasks = JoinSet::new();

        for (index, entry) in entries.into_iter().enumerate() {
            let filename = url_basename(&entry.url);
            let skip = match &filename {
                _ if !entry.has_url() => Some("no url".to_string()),
                None => Some(format!("url {} has no file name", entry.url)),
                Some(name) if !scheduled.insert(name.clone()) => {
                    Some(format!("{} already scheduled", name))
                }
                Some(_) => None,
            };

            if let Some(reason) = skip {
                log::warn!("Skipping platform {}: {}", entry.id, reason);
                slots.push(Some(ArtifactReport {
                    label: entry.id,
                    artifact: None,
                    outcome: ArtifactOutcome::Skipped(reason),
                }));
                continue;
            }

            slots.push(None);
            let pipeline = self.clone();
            tasks.spawn(async move { (index, pipeline.process_entry(entry).await) });
        }

        collect(tasks, slots).await
    }

    /// Signs every installer found in the build directories.
    pub async fn sign_local_installers(&self) -> Result<BatchReport> {
        let installers = self.locator.find_installers()?;
        log::info!("Found {} installer(s)", installers.len());

        let mut tasks = JoinSet::new();
        for (index, installer) in installers.iter().cloned().enumerate() {
            let pipeline = self.clone();
            tasks.spawn(async move { (index, pipeline.process_file(installer).await) });
        }

        collect(tasks, installers.iter().map(|_| None).collect()).await
    }

    async fn process_entry(&self, entry: PlatformEntry) -> ArtifactReport {
        log::info!("Processing platform {} ({})", entry.id, entry.url);
        match self.locator.locate(&entry.url).await {
            Ok(path) => {
                let mut report = self.process_file(path).await;
                report.label = entry.id;
                report
            }
            Err(e) => {
                log::error!("Platform {}: {}", entry.id, e);
                ArtifactReport {
                    label: entry.id,
                    artifact: None,
                    outcome: ArtifactOutcome::Failed(e),
                }
            }
        }
    }

    async fn process_file(&self, path: PathBuf) -> ArtifactReport {
        let label = file_name(&path);
        let outcome = match self.sign_and_inject(&path, &label).await {
            Ok(matched) => ArtifactOutcome::Signed { matched },
            Err(e) => {
                log::error!("{}: {}", label, e);
                ArtifactOutcome::Failed(e)
            }
        };
        ArtifactReport {
            label,
            artifact: Some(path),
            outcome,
        }
    }

    async fn sign_and_inject(&self, path: &Path, filename: &str) -> Result<usize> {
        let signature = self.signer.sign(path, &self.key).await?;
        let mode = self.match_mode;
        self.store
            .update(|manifest| manifest.inject_signature(filename, &signature, mode))
            .await
    }
}

async fn collect(
    mut tasks: JoinSet<(usize, ArtifactReport)>,
    mut slots: Vec<Option<ArtifactReport>>,
) -> Result<BatchReport> {
    while let Some(joined) = tasks.join_next().await {
        let (index, report) = joined.map_err(|e| anyhow::anyhow!("signing task failed: {}", e))?;
        if let Some(slot) = slots.get_mut(index) {
            *slot = Some(report);
        }
    }

    into_batch(slots.into_iter().flatten().collect())
}

/// Fails the whole batch if any artifact hit an error that is not isolated
/// to that artifact.
fn into_batch(mut artifacts: Vec<ArtifactReport>) -> Result<BatchReport> {
    let fatal = artifacts.iter().position(|a| {
        matches!(&a.outcome, ArtifactOutcome::Failed(e) if !e.is_recoverable())
    });
    if let Some(index) = fatal {
        if let ArtifactOutcome::Failed(e) = artifacts.swap_remove(index).outcome {
            return Err(e);
        }
    }
    Ok(BatchReport { artifacts })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::{Signature, Signer};
    use async_trait::async_trait;
    use std::time::Duration;

    struct EchoSigner;

    #[async_trait]
    impl Signer for EchoSigner {
        fn name(&self) -> &str {
            "echo"
        }

        async fn sign(&self, artifact: &Path, _key: &KeyMaterial) -> anyhow::Result<Signature> {
            let name = artifact.file_name().unwrap().to_string_lossy();
            if name.contains("broken") {
                anyhow::bail!("cannot sign {}", name);
            }
            Ok(Signature::new(format!("SIG:{}", name)))
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        manifest: PathBuf,
        pipeline: SigningPipeline,
    }

    async fn fixture(manifest: &str, files: &[&str]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let msi = dir.path().join("bundle/msi");
        std::fs::create_dir_all(&msi).unwrap();
        for file in files {
            std::fs::write(msi.join(file), b"bytes").unwrap();
        }
        let path = dir.path().join("updater.json");
        std::fs::write(&path, manifest).unwrap();

        let locator = ArtifactLocator::new(
            vec![msi],
            dir.path().join("temp"),
            5,
            Duration::from_secs(1),
        )
        .unwrap();
        let pipeline = SigningPipeline::new(
            locator,
            SignerChain::new().push(EchoSigner),
            ManifestStore::load(&path, None).await.unwrap(),
            KeyMaterial::new(dir.path().join("k"), None),
            MatchMode::Basename,
        );
        Fixture {
            _dir: dir,
            manifest: path,
            pipeline,
        }
    }

    const MANIFEST: &str = r#"{
  "version": "1.0.1",
  "platforms": {
    "win-msi": {"url": "http://127.0.0.1:9/app.msi", "signature": ""},
    "win-broken": {"url": "http://127.0.0.1:9/broken.msi", "signature": ""},
    "win-gone": {"url": "http://127.0.0.1:9/gone.msi", "signature": ""},
    "win-nourl": {"signature": ""}
  }
}"#;

    #[tokio::test]
    async fn failures_are_isolated_per_artifact() {
        let f = fixture(MANIFEST, &["app.msi", "broken.msi"]).await;
        let report = f.pipeline.sign_manifest_entries().await.unwrap();

        let labels: Vec<_> = report.artifacts.iter().map(|a| a.label.as_str()).collect();
        assert_eq!(labels, vec!["win-msi", "win-broken", "win-gone", "win-nourl"]);
        assert!(report.artifacts[0].is_complete());
        assert!(matches!(
            report.artifacts[1].outcome,
            ArtifactOutcome::Failed(ReleaseError::Signing { .. })
        ));
        assert!(matches!(
            report.artifacts[2].outcome,
            ArtifactOutcome::Failed(ReleaseError::Fetch { .. })
        ));
        assert!(matches!(report.artifacts[3].outcome, ArtifactOutcome::Skipped(_)));
        assert_eq!(report.completed(), 1);
        assert_eq!(report.failed(), 2);
        assert!(report.is_success());

        let text = std::fs::read_to_string(&f.manifest).unwrap();
        assert!(text.contains("\"signature\": \"SIG:app.msi\""));
    }

    #[tokio::test]
    async fn local_installers_are_all_signed() {
        let manifest = r#"{"platforms":{
            "a": {"url": "https://x/a.msi", "signature": ""},
            "b": {"url": "https://x/b.msi", "signature": ""}}}"#;
        let f = fixture(manifest, &["a.msi", "b.msi", "notes.txt"]).await;

        let report = f.pipeline.sign_local_installers().await.unwrap();
        assert_eq!(report.artifacts.len(), 2);
        assert_eq!(report.completed(), 2);

        let signed = f.pipeline.store().snapshot().await.platforms();
        assert_eq!(signed[0].signature, "SIG:a.msi");
        assert_eq!(signed[1].signature, "SIG:b.msi");
    }

    #[tokio::test]
    async fn unreferenced_installer_is_not_complete() {
        let manifest = r#"{"platforms":{"a": {"url": "https://x/other.msi", "signature": ""}}}"#;
        let f = fixture(manifest, &["a.msi"]).await;

        let report = f.pipeline.sign_local_installers().await.unwrap();
        assert!(matches!(report.artifacts[0].outcome, ArtifactOutcome::Signed { matched: 0 }));
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn duplicate_artifacts_are_scheduled_once() {
        let manifest = r#"{"platforms":{
            "x64": {"url": "https://x/app.msi", "signature": ""},
            "x64-mirror": {"url": "https://mirror/app.msi", "signature": ""}}}"#;
        let f = fixture(manifest, &["app.msi"]).await;

        let report = f.pipeline.sign_manifest_entries().await.unwrap();
        assert!(matches!(report.artifacts[0].outcome, ArtifactOutcome::Signed { matched: 2 }));
        assert!(matches!(report.artifacts[1].outcome, ArtifactOutcome::Skipped(_)));
    }

    #[test]
    fn unrecoverable_failure_fails_the_batch() {
        let signed = ArtifactReport {
            label: "a.msi".into(),
            artifact: None,
            outcome: ArtifactOutcome::Signed { matched: 1 },
        };
        let fetch = ArtifactReport {
            label: "b.msi".into(),
            artifact: None,
            outcome: ArtifactOutcome::Failed(ReleaseError::fetch("https://x/b.msi", "404")),
        };
        let report = into_batch(vec![signed, fetch]).unwrap();
        assert_eq!(report.completed(), 1);
        assert_eq!(report.failed(), 1);

        let manifest = ArtifactReport {
            label: "c.msi".into(),
            artifact: None,
            outcome: ArtifactOutcome::Failed(ReleaseError::Manifest {
                path: PathBuf::from("updater.json"),
                reason: "platforms is not an object".into(),
            }),
        };
        let err = into_batch(vec![manifest]).unwrap_err();
        assert!(matches!(err, ReleaseError::Manifest { .. }));
    }
}
