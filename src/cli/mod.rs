//! Command line interface for release_sync.
//!
//! Parses arguments, loads the project configuration and dispatches to the
//! command handlers, which report through the [`OutputManager`].

mod args;
pub mod commands;
mod output;

pub use args::{Args, Command, RuntimeConfig};
pub use output::OutputManager;

use crate::error::{CliError, Result};

/// Parse command line arguments
pub fn parse_args() -> Args {
    Args::parse_args()
}

/// Runs the parsed command and returns the process exit code.
pub async fn run(args: Args) -> Result<i32> {
    args.validate()
        .map_err(|reason| CliError::InvalidArguments { reason })?;

    let runtime = RuntimeConfig::from(&args);
    commands::execute(&args.command, &runtime).await
}
