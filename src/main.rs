//! release_sync - release pipeline tooling for desktop applications.
//!
//! Keeps versions consistent across config files, cuts tagged releases and
//! signs installers into the update manifest.

use release_sync::cli;
use std::process;

#[tokio::main]
async fn main() {
    let args = cli::parse_args();

    // RUST_LOG wins; --verbose only raises the default
    let default_filter = if args.verbose {
        "debug"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let exit_code = match cli::run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    process::exit(exit_code);
}
