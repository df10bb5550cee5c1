//! Artifact signing with prioritized, interchangeable backends.
//!
//! A [`SignerChain`] holds backends in priority order and returns the first
//! signature produced. Backend failures are logged and collected; only when
//! every backend has failed does the chain return `ReleaseError::Signing`.
//!
//! The default chain is:
//!
//! 1. [`KeySigner`] - Ed25519 over the SHA-256 digest of the artifact, in-process
//! 2. [`ExternalSigner`] - an external signer CLI, newer then older argument syntax
//!
//! Signatures are never verified here; that is the update client's job.

mod digest;
mod external;
mod key;

pub use digest::{sha256_file, sha256_hex};
pub use external::{ExternalSigner, ExternalSignerConfig, ProcessOutcome};
pub use key::KeySigner;

use crate::error::{ReleaseError, Result};
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};

/// Opaque signature string, encoding chosen by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature(String);

impl Signature {
    /// Wraps an encoded signature.
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Encoded signature.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 30 characters, for logs.
    pub fn preview(&self) -> String {
        let head: String = self.0.chars().take(30).collect();
        format!("{}...", head)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Private key location and optional passphrase.
///
/// Lives only for one invocation; `Debug` never prints the passphrase.
#[derive(Clone)]
pub struct KeyMaterial {
    key_path: PathBuf,
    passphrase: Option<String>,
}

impl KeyMaterial {
    /// Key file at `key_path`, optionally passphrase protected.
    pub fn new(key_path: impl Into<PathBuf>, passphrase: Option<String>) -> Self {
        Self {
            key_path: key_path.into(),
            passphrase: passphrase.filter(|p| !p.is_empty()),
        }
    }

    /// Path of the key file.
    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    /// Passphrase, if any.
    pub fn passphrase(&self) -> Option<&str> {
        self.passphrase.as_deref()
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("key_path", &self.key_path)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// A signing backend.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Short backend name for logs and error reports.
    fn name(&self) -> &str;

    /// Signs the exact bytes of `artifact`.
    async fn sign(&self, artifact: &Path, key: &KeyMaterial) -> anyhow::Result<Signature>;
}

/// Ordered list of backends; the first success wins.
#[derive(Default)]
pub struct SignerChain {
    backends: Vec<Box<dyn Signer>>,
}

impl SignerChain {
    /// Empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// In-process key signing, then the external signer CLI.
    pub fn with_defaults(external: ExternalSignerConfig) -> Self {
        Self::new()
            .push(KeySigner)
            .push(ExternalSigner::new(external))
    }

    /// Appends a backend at the lowest priority.
    pub fn push(mut self, backend: impl Signer + 'static) -> Self {
        self.backends.push(Box::new(backend));
        self
    }

    /// Backend names in priority order.
    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Signs `artifact` with the first backend that succeeds.
    ///
    /// # Errors
    ///
    /// `ReleaseError::Signing` listing every attempt when all backends fail
    /// (or the chain is empty).
    pub async fn sign(&self, artifact: &Path, key: &KeyMaterial) -> Result<Signature> {
        let mut attempts = Vec::with_capacity(self.backends.len());

        for backend in &self.backends {
            log::info!("Signing {} with {}", artifact.display(), backend.name());
            match backend.sign(artifact, key).await {
                Ok(signature) => {
                    log::info!("✓ Signed with {}: {}", backend.name(), signature.preview());
                    return Ok(signature);
                }
                Err(e) => {
                    log::warn!("{} signing failed for {}: {:#}", backend.name(), artifact.display(), e);
                    attempts.push(format!("{}: {:#}", backend.name(), e));
                }
            }
        }

        Err(ReleaseError::Signing {
            artifact: artifact.to_path_buf(),
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    #[async_trait]
    impl Signer for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn sign(&self, _artifact: &Path, _key: &KeyMaterial) -> anyhow::Result<Signature> {
            Ok(Signature::new(self.0))
        }
    }

    struct Broken;

    #[async_trait]
    impl Signer for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn sign(&self, _artifact: &Path, _key: &KeyMaterial) -> anyhow::Result<Signature> {
            anyhow::bail!("backend unavailable")
        }
    }

    fn key() -> KeyMaterial {
        KeyMaterial::new("/keys/app.key", Some("secret".into()))
    }

    #[tokio::test]
    async fn first_success_wins() {
        let chain = SignerChain::new().push(Broken).push(Fixed("SIG")).push(Fixed("LATER"));
        let sig = chain.sign(Path::new("app.msi"), &key()).await.unwrap();
        assert_eq!(sig.as_str(), "SIG");
    }

    #[tokio::test]
    async fn exhausted_chain_reports_each_backend() {
        let chain = SignerChain::new().push(Broken).push(Broken);
        match chain.sign(Path::new("app.msi"), &key()).await {
            Err(ReleaseError::Signing { attempts, .. }) => {
                assert_eq!(attempts.len(), 2);
                assert!(attempts[0].contains("backend unavailable"));
            }
            other => panic!("expected signing error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn empty_chain_fails() {
        assert!(matches!(
            SignerChain::new().sign(Path::new("a"), &key()).await,
            Err(ReleaseError::Signing { .. })
        ));
    }

    #[test]
    fn default_chain_order() {
        let chain = SignerChain::with_defaults(ExternalSignerConfig::default());
        assert_eq!(chain.backend_names(), vec!["ed25519", "external"]);
    }

    #[test]
    fn key_material_debug_redacts_passphrase() {
        let rendered = format!("{:?}", key());
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
        assert_eq!(KeyMaterial::new("k", Some(String::new())).passphrase(), None);
    }

    #[test]
    fn preview_truncates() {
        let sig = Signature::new("a".repeat(64));
        assert_eq!(sig.preview(), format!("{}...", "a".repeat(30)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unusable_key_falls_back_to_external_signer() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("app_1.0.2_x64-setup.exe");
        std::fs::write(&artifact, b"installer").unwrap();
        let key_path = dir.path().join("garbage.key");
        std::fs::write(&key_path, "not a key at all").unwrap();

        let program = dir.path().join("signer.sh");
        std::fs::write(&program, "#!/bin/sh\necho \"external-sig\"\n").unwrap();
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();

        let chain = SignerChain::with_defaults(ExternalSignerConfig {
            program: program.to_string_lossy().into_owned(),
            syntaxes: vec![vec!["sign".into(), "--key".into(), "{key}".into(), "{file}".into()]],
            password_flag: "--password".into(),
            timeout_secs: 10,
        });
        assert_eq!(chain.backend_names(), vec!["ed25519", "external"]);

        let key = KeyMaterial::new(&key_path, None);
        assert!(KeySigner.sign(&artifact, &key).await.is_err());

        let sig = chain.sign(&artifact, &key).await.unwrap();
        assert_eq!(sig.as_str(), "external-sig");
    }
}
