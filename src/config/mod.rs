//! Project layout configuration from `release.toml`.
//!
//! Every field has a default matching the conventional Tauri project layout,
//! so the file is optional. Relative paths resolve against the project root.

use crate::error::{CliError, ReleaseError, Result};
use crate::manifest::MatchMode;
use crate::signing::ExternalSignerConfig;
use crate::sync::{ConfigTarget, TargetFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file name, looked up in the project root.
pub const CONFIG_FILE_NAME: &str = "release.toml";

/// Release pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReleaseConfig {
    /// Version-of-record file
    pub version_file: PathBuf,

    /// Markdown update log prepended on each release
    pub update_log: PathBuf,

    /// Download directory for artifacts not found locally
    pub temp_dir: PathBuf,

    /// Build output directories searched for installers, in priority order
    pub build_dirs: Vec<PathBuf>,

    /// File extensions treated as installers during discovery
    pub installer_extensions: Vec<String>,

    /// Optional secondary manifest that mirrors every write to the primary
    pub latest_manifest: Option<PathBuf>,

    /// How artifact filenames are matched against platform urls
    pub match_mode: MatchMode,

    /// Maximum redirect hops followed per download
    pub max_redirects: usize,

    /// Per-download timeout in seconds
    pub download_timeout_secs: u64,

    /// Config files that carry a copy of the version
    pub targets: Vec<ConfigTarget>,

    /// External signer fallback
    pub signer: ExternalSignerConfig,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            version_file: PathBuf::from("src/constants/version.js"),
            update_log: PathBuf::from("UPDATE_LOG.md"),
            temp_dir: PathBuf::from("temp"),
            build_dirs: vec![
                PathBuf::from("src-tauri/target/release/bundle/msi"),
                PathBuf::from("src-tauri/target/release/bundle/nsis"),
            ],
            installer_extensions: vec!["msi".into(), "exe".into()],
            latest_manifest: None,
            match_mode: MatchMode::default(),
            max_redirects: 5,
            download_timeout_secs: 300,
            targets: default_targets(),
            signer: ExternalSignerConfig::default(),
        }
    }
}

/// The three derived config files of a Tauri desktop app.
pub fn default_targets() -> Vec<ConfigTarget> {
    vec![
        ConfigTarget::new(
            "package.json",
            "package.json",
            TargetFormat::Json {
                key_path: "version".into(),
            },
        ),
        ConfigTarget::new(
            "tauri.conf.json",
            "src-tauri/tauri.conf.json",
            TargetFormat::Json {
                key_path: "package.version".into(),
            },
        ),
        ConfigTarget::new(
            "Cargo.toml",
            "src-tauri/Cargo.toml",
            TargetFormat::Text {
                pattern: r#"version\s*=\s*["'](.+?)["']"#.into(),
            },
        ),
    ]
}

impl ReleaseConfig {
    /// Loads configuration for the project at `root`.
    ///
    /// An explicit `config_path` must exist; otherwise `root/release.toml` is
    /// read when present and defaults are used when it is not.
    pub fn load(root: &Path, config_path: Option<&Path>) -> Result<Self> {
        let path = match config_path {
            Some(explicit) => {
                if !explicit.exists() {
                    return Err(ReleaseError::Cli(CliError::MissingArgument {
                        argument: format!("config file {}", explicit.display()),
                    }));
                }
                explicit.to_path_buf()
            }
            None => root.join(CONFIG_FILE_NAME),
        };

        let config = if path.exists() {
            log::debug!("Loading release config from {}", path.display());
            let content = std::fs::read_to_string(&path)?;
            toml::from_str(&content)?
        } else {
            log::debug!("No {} found, using default layout", path.display());
            Self::default()
        };

        Ok(config.resolved(root))
    }

    /// Rebases every relative path onto `root`.
    pub fn resolved(mut self, root: &Path) -> Self {
        let rebase = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = root.join(&*p);
            }
        };

        rebase(&mut self.version_file);
        rebase(&mut self.update_log);
        rebase(&mut self.temp_dir);
        self.build_dirs.iter_mut().for_each(rebase);
        if let Some(latest) = self.latest_manifest.as_mut() {
            rebase(latest);
        }
        for target in &mut self.targets {
            rebase(&mut target.path);
        }
        self
    }

    /// Download timeout as a [`Duration`].
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_tauri_layout() {
        let config = ReleaseConfig::load(Path::new("/project"), None).unwrap();
        assert_eq!(
            config.version_file,
            PathBuf::from("/project/src/constants/version.js")
        );
        assert_eq!(config.targets.len(), 3);
        assert_eq!(config.targets[2].path, PathBuf::from("/project/src-tauri/Cargo.toml"));
        assert_eq!(config.match_mode, MatchMode::Substring);
        assert!(config.latest_manifest.is_none());
    }

    #[test]
    fn reads_release_toml_overrides() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"
version_file = "version.js"
latest_manifest = "latest.json"
match_mode = "basename"
max_redirects = 2

[[targets]]
name = "cargo"
path = "Cargo.toml"
format = { kind = "toml", key_path = "package.version" }

[signer]
program = "minisign-wrapper"
timeout_secs = 10
"#,
        )
        .unwrap();

        let config = ReleaseConfig::load(dir.path(), None).unwrap();
        assert_eq!(config.version_file, dir.path().join("version.js"));
        assert_eq!(config.latest_manifest, Some(dir.path().join("latest.json")));
        assert_eq!(config.match_mode, MatchMode::Basename);
        assert_eq!(config.max_redirects, 2);
        assert_eq!(config.targets.len(), 1);
        assert!(matches!(config.targets[0].format, TargetFormat::Toml { .. }));
        assert_eq!(config.signer.program, "minisign-wrapper");
        assert_eq!(config.signer.timeout_secs, 10);
    }

    #[test]
    fn explicit_config_must_exist() {
        let result = ReleaseConfig::load(Path::new("/project"), Some(Path::new("/nope.toml")));
        assert!(matches!(
            result,
            Err(ReleaseError::Cli(CliError::MissingArgument { .. }))
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "versoin_file = 'x'\n").unwrap();
        assert!(matches!(
            ReleaseConfig::load(dir.path(), None),
            Err(ReleaseError::Toml(_))
        ));
    }
}
