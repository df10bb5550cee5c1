//! Artifact downloads with bounded redirect following.

use crate::error::{ReleaseError, Result};
use reqwest::StatusCode;
use reqwest::header::LOCATION;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::OnceCell;
use url::Url;

/// Downloads artifacts into a temp directory.
///
/// Redirects are followed by hand so the hop count is bounded and every
/// hop is logged. The temp directory is created on first use and shared by
/// all clones.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: reqwest::Client,
    temp_dir: PathBuf,
    temp_ready: Arc<OnceCell<()>>,
    max_redirects: usize,
}

impl Downloader {
    /// Creates a downloader writing into `temp_dir`.
    pub fn new(temp_dir: impl Into<PathBuf>, max_redirects: usize, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build HTTP client: {}", e))?;

        Ok(Self {
            client,
            temp_dir: temp_dir.into(),
            temp_ready: Arc::new(OnceCell::new()),
            max_redirects,
        })
    }

    /// Temp directory downloads land in.
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Downloads `url` to `<temp_dir>/<filename>`.
    ///
    /// # Errors
    ///
    /// `ReleaseError::Fetch` on transport errors, non-success statuses, a
    /// redirect without `Location`, or more than `max_redirects` hops. No
    /// partial file is left behind.
    pub async fn download(&self, url: &str, filename: &str) -> Result<PathBuf> {
        self.temp_ready
            .get_or_try_init(|| async {
                tokio::fs::create_dir_all(&self.temp_dir).await?;
                log::debug!("Temp directory ready at {}", self.temp_dir.display());
                Ok::<_, std::io::Error>(())
            })
            .await?;

        let mut current = Url::parse(url).map_err(|e| ReleaseError::fetch(url, e))?;
        let mut hops = 0;

        log::info!("Downloading {}", url);
        let response = loop {
            let response = self
                .client
                .get(current.clone())
                .send()
                .await
                .map_err(|e| ReleaseError::fetch(current.as_str(), e))?;

            let status = response.status();
            if !is_followed_redirect(status) {
                break response;
            }

            if hops == self.max_redirects {
                return Err(ReleaseError::fetch(
                    url,
                    format!("too many redirects (max {})", self.max_redirects),
                ));
            }
            hops += 1;

            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .ok_or_else(|| {
                    ReleaseError::fetch(current.as_str(), format!("HTTP {} without Location", status))
                })?;
            current = current
                .join(location)
                .map_err(|e| ReleaseError::fetch(current.as_str(), e))?;
            log::debug!("Redirect #{} ({}) to {}", hops, status.as_u16(), current);
        };

        let status = response.status();
        if !status.is_success() {
            return Err(ReleaseError::fetch(current.as_str(), format!("HTTP {}", status)));
        }

        let dest = self.temp_dir.join(filename);
        match write_body(response, &dest).await {
            Ok(bytes) => {
                log::info!("✓ Downloaded {} ({} bytes)", dest.display(), bytes);
                Ok(dest)
            }
            Err(reason) => {
                let _ = tokio::fs::remove_file(&dest).await;
                Err(ReleaseError::fetch(current.as_str(), reason))
            }
        }
    }
}

fn is_followed_redirect(status: StatusCode) -> bool {
    matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308)
}

async fn write_body(mut response: reqwest::Response, dest: &Path) -> std::result::Result<u64, String> {
    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| format!("cannot create {}: {}", dest.display(), e))?;
    let mut written = 0u64;

    while let Some(chunk) = response.chunk().await.map_err(|e| e.to_string())? {
        file.write_all(&chunk).await.map_err(|e| e.to_string())?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(|e| e.to_string())?;

    Ok(written)
}
