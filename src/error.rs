//! Error types for release pipeline operations.
//!
//! The taxonomy mirrors how failures propagate through a release batch:
//! `Parse` aborts the batch, `MissingField` is recorded per config target,
//! `Fetch` and `Signing` abort a single artifact, and `ManifestMismatch`
//! is only ever reported as a warning.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for release operations
pub type Result<T> = std::result::Result<T, ReleaseError>;

/// Main error type for all release operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// Version-of-record unreadable or malformed
    #[error("Parse error in {path}: {reason}")]
    Parse {
        /// File being parsed
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// A config target lacks the field that carries the version
    #[error("Missing field '{field}' in {path}")]
    MissingField {
        /// Config file
        path: PathBuf,
        /// Key path or pattern that matched nothing
        field: String,
    },

    /// Download transport or HTTP failure
    #[error("Fetch failed for {url}: {reason}")]
    Fetch {
        /// URL being fetched
        url: String,
        /// Transport error or HTTP status
        reason: String,
    },

    /// Every signing backend failed
    #[error("Signing failed for {artifact}: {}", attempts.join("; "))]
    Signing {
        /// Artifact that could not be signed
        artifact: PathBuf,
        /// One message per backend, in priority order
        attempts: Vec<String>,
    },

    /// No platform entry matched an artifact filename
    #[error("No platform entry in the manifest references '{filename}'")]
    ManifestMismatch {
        /// Artifact filename that matched nothing
        filename: String,
    },

    /// Malformed update manifest
    #[error("Invalid manifest {path}: {reason}")]
    Manifest {
        /// Manifest file
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Format-preserving TOML errors
    #[error("TOML edit error: {0}")]
    TomlEdit(#[from] toml_edit::TomlError),

    /// Invalid regular expression in a text target
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// Generic errors from anyhow
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// Missing required file or argument
    #[error("Missing required argument: {argument}")]
    MissingArgument {
        /// Argument name
        argument: String,
    },

    /// Command execution failed
    #[error("Command execution failed: {command} - {reason}")]
    ExecutionFailed {
        /// Command that failed
        command: String,
        /// Reason for the error
        reason: String,
    },
}

impl ReleaseError {
    /// Shorthand for a `Fetch` error.
    pub fn fetch(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Shorthand for a `Parse` error.
    pub fn parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the batch may continue past this error.
    ///
    /// Only version-of-record parse failures and malformed manifests stop a
    /// whole release run; everything else is isolated to one target or artifact.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Parse { .. } | Self::Manifest { .. })
    }
}
