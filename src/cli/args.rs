//! Command line argument parsing and validation.

use crate::version::BumpKind;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Release pipeline tooling for desktop applications
#[derive(Parser, Debug)]
#[command(
    name = "release_sync",
    version,
    about = "Version sync, changelog parsing, artifact signing and update-manifest propagation",
    long_about = "Keeps the version-of-record and every derived config file in step, cuts tagged
releases, and signs installers into the update manifest consumed by the app's updater.

Usage:
  release_sync verify
  release_sync sync --force
  release_sync release minor --no-push
  release_sync sign-manifest updater.json ~/.keys/app.key
  release_sync sign-artifacts updater.json ~/.keys/app.key
  release_sync changelog UPDATE_LOG.md

Exit code 0 = success. Signing exits non-zero only if no artifact was signed and injected."
)]
pub struct Args {
    /// Project root; relative config paths resolve against it
    #[arg(long, global = true, value_name = "DIR", default_value = ".")]
    pub root: PathBuf,

    /// Config file (default: <root>/release.toml when present)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Show detailed progress and debug logs
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors and command output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Bump the version, record history, sync configs, update the log, commit, tag and push
    Release {
        /// Component to bump
        #[arg(value_enum, default_value_t = BumpKind::Patch)]
        kind: BumpKind,

        /// Proceed even if the current version has no history entry
        #[arg(long)]
        force: bool,

        /// Commit and tag locally without pushing
        #[arg(long)]
        no_push: bool,
    },

    /// Propagate the version-of-record into every config file
    Sync {
        /// Proceed even if the version has no history entry
        #[arg(long)]
        force: bool,
    },

    /// Read-only consistency report; non-zero exit on mismatch
    Verify,

    /// Locate or download each platform's artifact, sign it, inject the signature
    SignManifest {
        /// Update manifest to rewrite
        manifest: PathBuf,

        /// Private key file
        key: PathBuf,

        /// Key passphrase
        #[arg(env = "RELEASE_SYNC_KEY_PASSWORD", hide_env_values = true)]
        passphrase: Option<String>,
    },

    /// Sign installers found in the build output and inject the signatures
    SignArtifacts {
        /// Update manifest to rewrite
        manifest: PathBuf,

        /// Private key file; without it installers are only listed
        key: Option<PathBuf>,

        /// Key passphrase
        #[arg(env = "RELEASE_SYNC_KEY_PASSWORD", hide_env_values = true)]
        passphrase: Option<String>,
    },

    /// Parse a markdown changelog and print it as JSON
    Changelog {
        /// Markdown file
        file: PathBuf,
    },

    /// Ask an update manifest whether it offers something newer
    CheckUpdate {
        /// Manifest url or path
        manifest: String,

        /// Running version (default: the version-of-record)
        #[arg(long, value_name = "VERSION")]
        current: Option<String>,
    },
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if !self.root.is_dir() {
            return Err(format!(
                "Project root {} is not a directory",
                self.root.display()
            ));
        }

        match &self.command {
            Command::SignManifest { key, .. } => require_file(key, "key"),
            Command::SignArtifacts { key: Some(key), .. } => require_file(key, "key"),
            Command::Changelog { file } => require_file(file, "changelog"),
            _ => Ok(()),
        }
    }
}

fn require_file(path: &Path, what: &str) -> Result<(), String> {
    if path.is_file() {
        Ok(())
    } else {
        Err(format!("{} file not found: {}", what, path.display()))
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    output: super::OutputManager,
    root: PathBuf,
    config_path: Option<PathBuf>,
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self {
            output: super::OutputManager::new(args.verbose, args.quiet),
            root: args.root.clone(),
            config_path: args.config.clone(),
        }
    }
}

impl RuntimeConfig {
    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }

    /// Project root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Explicit config file, if given
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Print verbose message if in verbose mode
    pub fn verbose_println(&self, message: &str) -> std::io::Result<()> {
        self.output.verbose(message)
    }

    /// Print warning message if not in quiet mode
    pub fn warn(&self, message: &str) -> std::io::Result<()> {
        self.output.warn(message)
    }

    /// Print success message if not in quiet mode
    pub fn success(&self, message: &str) -> std::io::Result<()> {
        self.output.success(message)
    }

    /// Print progress message
    pub fn progress(&self, message: &str) -> std::io::Result<()> {
        self.output.progress(message)
    }

    /// Print section header
    pub fn section(&self, title: &str) -> std::io::Result<()> {
        self.output.section(title)
    }

    /// Print indented text
    pub fn indent(&self, message: &str) -> std::io::Result<()> {
        self.output.indent(message)
    }

    /// Print an error, even in quiet mode
    pub fn error(&self, message: &str) -> std::io::Result<()> {
        self.output.error(message)
    }
}
