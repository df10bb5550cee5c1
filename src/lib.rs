//! Release pipeline library for desktop applications.
//!
//! This library provides:
//! - Version-of-record access and version propagation across config files
//! - Markdown changelog parsing and update log maintenance
//! - Artifact signing with an ordered list of fallback backends
//! - Artifact lookup in build output with a download fallback
//! - Signature injection into the update manifest
//! - The client-side update-check state machine
//!
//! It can be used both as a CLI tool and as a library dependency.

pub mod changelog;
pub mod cli;
pub mod config;
pub mod error;
pub mod locator;
pub mod manifest;
pub mod pipeline;
pub mod release;
pub mod signing;
pub mod sync;
pub mod updater;
pub mod version;

// Re-export commonly used types
pub use error::{CliError, ReleaseError, Result};
pub use version::Version;
