//! `changelog`: markdown in, JSON out.

use crate::changelog;
use crate::cli::RuntimeConfig;
use crate::error::Result;
use std::path::Path;

pub(super) fn run(runtime: &RuntimeConfig, file: &Path) -> Result<i32> {
    let markdown = std::fs::read_to_string(file)?;
    let entries = changelog::parse(&markdown);
    runtime.verbose_println(&format!("Parsed {} release(s) from {}", entries.len(), file.display()))?;

    runtime.output().data(&serde_json::to_string_pretty(&entries)?)?;
    Ok(0)
}
