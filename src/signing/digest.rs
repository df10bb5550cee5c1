//! Streaming SHA-256 over artifact bytes.

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Computes the SHA-256 digest of a file.
///
/// Reads the file in 8KB chunks so large installers never sit in memory.
pub async fn sha256_file(path: &Path) -> Result<[u8; 32]> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hasher.finalize().into())
}

/// Hex-encoded SHA-256 of a file, for logs and reports.
pub async fn sha256_hex(path: &Path) -> Result<String> {
    Ok(hex::encode(sha256_file(path).await?))
}
