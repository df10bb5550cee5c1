//! Terminal output for command progress.
//!
//! Progress and results go to stdout, warnings and errors to stderr. Quiet
//! mode keeps errors and machine-readable output only.

use std::io::{self, Write};

/// Quiet/verbose aware printer.
#[derive(Debug, Clone, Copy)]
pub struct OutputManager {
    verbose: bool,
    quiet: bool,
}

impl OutputManager {
    /// Creates a printer. `quiet` wins over `verbose`.
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            verbose: verbose && !quiet,
            quiet,
        }
    }

    /// Whether verbose output is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Whether quiet mode is enabled.
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Detail shown only with `--verbose`.
    pub fn verbose(&self, message: &str) -> io::Result<()> {
        if self.verbose {
            writeln!(io::stdout().lock(), "{}", message)?;
        }
        Ok(())
    }

    /// Step in progress.
    pub fn progress(&self, message: &str) -> io::Result<()> {
        if !self.quiet {
            writeln!(io::stdout().lock(), "{}", message)?;
        }
        Ok(())
    }

    /// Completed step.
    pub fn success(&self, message: &str) -> io::Result<()> {
        if !self.quiet {
            writeln!(io::stdout().lock(), "✓ {}", message)?;
        }
        Ok(())
    }

    /// Non-fatal problem.
    pub fn warn(&self, message: &str) -> io::Result<()> {
        if !self.quiet {
            writeln!(io::stderr().lock(), "⚠ {}", message)?;
        }
        Ok(())
    }

    /// Failure, shown even in quiet mode.
    pub fn error(&self, message: &str) -> io::Result<()> {
        writeln!(io::stderr().lock(), "✗ {}", message)
    }

    /// Section header.
    pub fn section(&self, title: &str) -> io::Result<()> {
        if !self.quiet {
            let mut out = io::stdout().lock();
            writeln!(out)?;
            writeln!(out, "{}", title)?;
            writeln!(out, "{}", "─".repeat(title.chars().count()))?;
        }
        Ok(())
    }

    /// Indented detail line.
    pub fn indent(&self, message: &str) -> io::Result<()> {
        if !self.quiet {
            writeln!(io::stdout().lock(), "   {}", message)?;
        }
        Ok(())
    }

    /// Command result meant for pipes; printed regardless of quiet mode.
    pub fn data(&self, text: &str) -> io::Result<()> {
        writeln!(io::stdout().lock(), "{}", text)
    }
}
