//! External signer CLI fallback.
//!
//! The external tool is treated as an untrusted collaborator: exit status,
//! stdout and stderr are captured separately, an empty stdout counts as a
//! failure, and every invocation is bounded by a timeout.

use super::{KeyMaterial, Signature, Signer};
use anyhow::{anyhow, bail};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Configuration for [`ExternalSigner`].
///
/// Each entry of `syntaxes` is one argument list, tried in order. Placeholders:
/// `{key}` (key file), `{file}` (artifact), `{password}` (expands to
/// `password_flag <passphrase>`, or nothing without a passphrase).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ExternalSignerConfig {
    /// Program to run, looked up on `PATH` unless absolute
    pub program: String,
    /// Argument templates, newest CLI convention first
    pub syntaxes: Vec<Vec<String>>,
    /// Flag that precedes the passphrase
    pub password_flag: String,
    /// Per-invocation timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ExternalSignerConfig {
    fn default() -> Self {
        let syntax = |package: &str| {
            ["--yes", package, "signer", "sign", "--key", "{key}", "{password}", "{file}"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        };

        Self {
            program: "npx".into(),
            syntaxes: vec![syntax("@tauri-apps/cli"), syntax("tauri")],
            password_flag: "--password".into(),
            timeout_secs: 120,
        }
    }
}

/// Captured result of one external invocation.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    /// Exit code, `None` if killed by a signal
    pub code: Option<i32>,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl ProcessOutcome {
    fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs an external signer CLI.
#[derive(Debug, Clone)]
pub struct ExternalSigner {
    config: ExternalSignerConfig,
}

impl ExternalSigner {
    /// Creates a signer from `config`.
    pub fn new(config: ExternalSignerConfig) -> Self {
        Self { config }
    }

    /// Expands a template into concrete arguments.
    pub fn expand(&self, template: &[String], artifact: &Path, key: &KeyMaterial) -> Vec<String> {
        let mut args = Vec::with_capacity(template.len() + 1);
        for arg in template {
            match arg.as_str() {
                "{password}" => {
                    if let Some(passphrase) = key.passphrase() {
                        args.push(self.config.password_flag.clone());
                        args.push(passphrase.to_string());
                    }
                }
                _ => args.push(
                    arg.replace("{key}", &key.key_path().to_string_lossy())
                        .replace("{file}", &artifact.to_string_lossy()),
                ),
            }
        }
        args
    }

    fn resolve_program(&self) -> anyhow::Result<PathBuf> {
        which::which(&self.config.program)
            .map_err(|e| anyhow!("{} not found: {}", self.config.program, e))
    }

    async fn run(&self, program: &Path, args: &[String]) -> anyhow::Result<ProcessOutcome> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| anyhow!("failed to spawn {}: {}", program.display(), e))?;

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| anyhow!("failed to wait for signer: {}", e))?,
            Err(_elapsed) => bail!("timed out after {}s", timeout.as_secs()),
        };

        Ok(ProcessOutcome {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[async_trait]
impl Signer for ExternalSigner {
    fn name(&self) -> &str {
        "external"
    }

    async fn sign(&self, artifact: &Path, key: &KeyMaterial) -> anyhow::Result<Signature> {
        if self.config.syntaxes.is_empty() {
            bail!("no invocation syntaxes configured");
        }
        let program = self.resolve_program()?;
        let mut failures = Vec::new();

        for (index, template) in self.config.syntaxes.iter().enumerate() {
            let args = self.expand(template, artifact, key);
            log::debug!(
                "Running {} with syntax #{} ({} args)",
                program.display(),
                index + 1,
                args.len()
            );

            let outcome = match self.run(&program, &args).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    log::warn!("Signer syntax #{} failed: {}", index + 1, e);
                    failures.push(format!("syntax #{}: {}", index + 1, e));
                    continue;
                }
            };

            let signature = outcome.stdout.trim();
            if outcome.success() && !signature.is_empty() {
                return Ok(Signature::new(signature));
            }

            let reason = if outcome.success() {
                "empty output".to_string()
            } else {
                format!(
                    "exit code {:?}: {}",
                    outcome.code,
                    outcome.stderr.trim()
                )
            };
            log::warn!("Signer syntax #{} failed: {}", index + 1, reason);
            failures.push(format!("syntax #{}: {}", index + 1, reason));
        }

        Err(anyhow!(failures.join("; ")))
    }
}
