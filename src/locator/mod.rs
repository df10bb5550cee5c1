//! Resolving manifest urls to artifact files on disk.
//!
//! Local build output is always preferred; a download into the temp
//! directory is the fallback.

mod http;

pub use http::Downloader;

use crate::config::ReleaseConfig;
use crate::error::{ReleaseError, Result};
use crate::manifest::url_basename;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Finds or fetches release artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactLocator {
    build_dirs: Vec<PathBuf>,
    installer_extensions: Vec<String>,
    downloader: Downloader,
}

impl ArtifactLocator {
    /// Locator searching `build_dirs` and downloading into `temp_dir`.
    pub fn new(
        build_dirs: Vec<PathBuf>,
        temp_dir: impl Into<PathBuf>,
        max_redirects: usize,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            build_dirs,
            installer_extensions: vec!["msi".into(), "exe".into()],
            downloader: Downloader::new(temp_dir, max_redirects, timeout)?,
        })
    }

    /// Locator for a resolved project configuration.
    pub fn from_config(config: &ReleaseConfig) -> Result<Self> {
        let mut locator = Self::new(
            config.build_dirs.clone(),
            &config.temp_dir,
            config.max_redirects,
            config.download_timeout(),
        )?;
        locator.installer_extensions = config.installer_extensions.clone();
        Ok(locator)
    }

    /// Searched build directories.
    pub fn build_dirs(&self) -> &[PathBuf] {
        &self.build_dirs
    }

    /// Resolves `url` to a local file.
    ///
    /// Searches the build directories for a file named like the url's last
    /// path segment; the first hit wins. Otherwise the url is downloaded.
    ///
    /// # Errors
    ///
    /// `ReleaseError::Fetch` if the url has no file name or the download fails.
    pub async fn locate(&self, url: &str) -> Result<PathBuf> {
        let filename =
            url_basename(url).ok_or_else(|| ReleaseError::fetch(url, "url has no file name"))?;

        if let Some(local) = self.find_local(&filename) {
            log::info!("Using local build output {}", local.display());
            return Ok(local);
        }

        log::debug!("{} not found in build output, downloading", filename);
        self.downloader.download(url, &filename).await
    }

    /// First build directory entry named `filename`.
    pub fn find_local(&self, filename: &str) -> Option<PathBuf> {
        self.build_dirs
            .iter()
            .map(|dir| dir.join(filename))
            .find(|candidate| candidate.is_file())
    }

    /// Installer files in the build directories, directory order then name order.
    pub fn find_installers(&self) -> Result<Vec<PathBuf>> {
        let mut installers = Vec::new();

        for dir in &self.build_dirs {
            if !dir.is_dir() {
                log::debug!("Build directory {} does not exist", dir.display());
                continue;
            }

            let mut found = Vec::new();
            for entry in std::fs::read_dir(dir)? {
                let path = entry?.path();
                if path.is_file() && self.is_installer(&path) {
                    found.push(path);
                }
            }
            found.sort();
            installers.extend(found);
        }

        Ok(installers)
    }

    fn is_installer(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.installer_extensions
                    .iter()
                    .any(|wanted| wanted.eq_ignore_ascii_case(ext))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locator(dirs: Vec<PathBuf>, temp: &Path) -> ArtifactLocator {
        ArtifactLocator::new(dirs, temp, 5, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn first_build_dir_wins() {
        let root = tempfile::tempdir().unwrap();
        let msi = root.path().join("msi");
        let nsis = root.path().join("nsis");
        std::fs::create_dir_all(&msi).unwrap();
        std::fs::create_dir_all(&nsis).unwrap();
        std::fs::write(msi.join("app.msi"), b"a").unwrap();
        std::fs::write(nsis.join("app.msi"), b"b").unwrap();

        let locator = locator(vec![msi.clone(), nsis], &root.path().join("temp"));
        let found = locator.locate("https://example.invalid/dl/app.msi").await.unwrap();
        assert_eq!(found, msi.join("app.msi"));
    }

    #[tokio::test]
    async fn url_without_file_name_is_a_fetch_error() {
        let root = tempfile::tempdir().unwrap();
        let locator = locator(vec![], &root.path().join("temp"));
        assert!(matches!(
            locator.locate("https://example.invalid/").await,
            Err(ReleaseError::Fetch { .. })
        ));
    }

    #[test]
    fn finds_installers_across_bundle_dirs() {
        let root = tempfile::tempdir().unwrap();
        let msi = root.path().join("bundle/msi");
        let nsis = root.path().join("bundle/nsis");
        std::fs::create_dir_all(&msi).unwrap();
        std::fs::create_dir_all(&nsis).unwrap();
        std::fs::write(msi.join("app_1.0.1_x64.msi"), b"").unwrap();
        std::fs::write(msi.join("app_1.0.1_x64.msi.zip"), b"").unwrap();
        std::fs::write(nsis.join("app_1.0.1_x64-setup.EXE"), b"").unwrap();

        let locator = locator(
            vec![msi.clone(), nsis.clone(), root.path().join("missing")],
            &root.path().join("temp"),
        );
        assert_eq!(
            locator.find_installers().unwrap(),
            vec![msi.join("app_1.0.1_x64.msi"), nsis.join("app_1.0.1_x64-setup.EXE")]
        );
    }
}
