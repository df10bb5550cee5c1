//! Serialized persistence of the update manifest.

use super::UpdateManifest;
use crate::error::Result;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Owns the manifest for one batch.
///
/// Every mutation is a whole-document read-modify-write performed under one
/// async mutex and persisted before the lock is released, so concurrent
/// artifact tasks never lose each other's signatures.
#[derive(Debug)]
pub struct ManifestStore {
    path: PathBuf,
    latest: Option<PathBuf>,
    manifest: Mutex<UpdateManifest>,
}

impl ManifestStore {
    /// Reads the manifest at `path`.
    ///
    /// `latest` is the optional secondary manifest kept in sync on persist.
    pub async fn load(path: impl Into<PathBuf>, latest: Option<PathBuf>) -> Result<Self> {
        let path = path.into();
        let text = tokio::fs::read_to_string(&path).await?;
        let manifest = UpdateManifest::parse(&text, &path)?;

        if let Some(version) = manifest.version() {
            log::info!("Manifest {} version {}", path.display(), version);
        }

        Ok(Self {
            path,
            latest,
            manifest: Mutex::new(manifest),
        })
    }

    /// Primary manifest path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the current document.
    pub async fn snapshot(&self) -> UpdateManifest {
        self.manifest.lock().await.clone()
    }

    /// Applies `f` to the manifest and persists the result.
    pub async fn update<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut UpdateManifest) -> R,
    {
        let mut manifest = self.manifest.lock().await;
        let result = f(&mut manifest);
        self.write(&manifest).await?;
        Ok(result)
    }

    /// Writes the current document to disk.
    pub async fn persist(&self) -> Result<()> {
        let manifest = self.manifest.lock().await;
        self.write(&manifest).await
    }

    async fn write(&self, manifest: &UpdateManifest) -> Result<()> {
        let json = manifest.to_pretty_json()?;
        tokio::fs::write(&self.path, &json).await?;
        log::debug!("Wrote manifest {}", self.path.display());

        if let Some(latest) = self.mirror_target().await {
            tokio::fs::write(&latest, &json).await?;
            log::info!("✓ Mirrored manifest to {}", latest.display());
        }
        Ok(())
    }

    async fn mirror_target(&self) -> Option<PathBuf> {
        let latest = self.latest.as_ref()?;
        if !tokio::fs::try_exists(latest).await.unwrap_or(false) {
            return None;
        }
        let same = match (
            tokio::fs::canonicalize(latest).await,
            tokio::fs::canonicalize(&self.path).await,
        ) {
            (Ok(a), Ok(b)) => a == b,
            _ => latest == &self.path,
        };
        (!same).then(|| latest.clone())
    }
}
