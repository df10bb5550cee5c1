//! Update source backed by a signed update manifest.

use super::{UpdatePayload, UpdateSource};
use crate::manifest::UpdateManifest;
use crate::version::Version;
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use std::path::Path;

/// Reads the update manifest from an http(s) url or a local path.
#[derive(Debug, Clone)]
pub struct ManifestSource {
    location: String,
    running: Version,
    client: reqwest::Client,
}

impl ManifestSource {
    /// Source for an application running `running`.
    pub fn new(location: impl Into<String>, running: Version) -> Self {
        Self {
            location: location.into(),
            running,
            client: reqwest::Client::new(),
        }
    }

    async fn fetch(&self) -> anyhow::Result<String> {
        if self.location.starts_with("http://") || self.location.starts_with("https://") {
            let response = self
                .client
                .get(&self.location)
                .send()
                .await
                .with_context(|| format!("fetching {}", self.location))?
                .error_for_status()?;
            Ok(response.text().await?)
        } else {
            tokio::fs::read_to_string(&self.location)
                .await
                .with_context(|| format!("reading {}", self.location))
        }
    }
}

#[async_trait]
impl UpdateSource for ManifestSource {
    async fn check(&self) -> anyhow::Result<UpdatePayload> {
        let text = self.fetch().await?;
        let manifest = UpdateManifest::parse(&text, Path::new(&self.location))?;
        let offered = manifest
            .version()
            .ok_or_else(|| anyhow!("manifest {} has no version", self.location))?;
        let version = Version::parse_lenient(offered)?;

        Ok(UpdatePayload {
            has_update: version > self.running,
            version: offered.to_string(),
            current_version: self.running.normalized(),
            notes: manifest.notes().map(String::from),
        })
    }
}
