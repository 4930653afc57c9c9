//! Integrity verification of downloaded artifacts
//!
//! Manifest digests are `sha256:<hex>`, `blake3:<hex>` or a bare 64-digit
//! hex string (taken as SHA-256). Hex compares case-insensitively.

use crate::core::error::{Result, UpdateError};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Supported digest algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha256,
    Blake3,
}

impl std::fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DigestAlgorithm::Sha256 => write!(f, "sha256"),
            DigestAlgorithm::Blake3 => write!(f, "blake3"),
        }
    }
}

/// A digest as published in the manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedDigest {
    pub algorithm: DigestAlgorithm,
    /// Lowercase hex
    pub hex: String,
}

impl ExpectedDigest {
    /// Parse a manifest digest; `None` when the form is not recognised
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (algorithm, encoded) = match raw.split_once(':') {
            Some((prefix, rest)) if prefix.eq_ignore_ascii_case("sha256") => {
                (DigestAlgorithm::Sha256, rest)
            }
            Some((prefix, rest)) if prefix.eq_ignore_ascii_case("blake3") => {
                (DigestAlgorithm::Blake3, rest)
            }
            Some(_) => return None,
            None => (DigestAlgorithm::Sha256, raw),
        };

        // Both algorithms produce 32-byte digests
        let bytes = hex::decode(encoded).ok()?;
        if bytes.len() != 32 {
            return None;
        }

        Some(Self {
            algorithm,
            hex: hex::encode(bytes),
        })
    }
}

impl std::fmt::Display for ExpectedDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

/// Validates artifacts against manifest digests
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegrityVerifier;

impl IntegrityVerifier {
    /// True only when the file exists and matches `expected_digest`
    pub async fn verify(path: &Path, expected_digest: &str) -> bool {
        match Self::check(path, expected_digest).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Integrity check failed for {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Like [`verify`](Self::verify), but reports what went wrong
    pub async fn check(path: &Path, expected_digest: &str) -> Result<()> {
        let expected = ExpectedDigest::parse(expected_digest).ok_or_else(|| {
            UpdateError::Parse(format!("unrecognised digest '{}'", expected_digest))
        })?;

        let actual = digest_file(path, expected.algorithm).await?;
        if actual != expected.hex {
            return Err(UpdateError::IntegrityMismatch {
                expected: expected.to_string(),
                actual: format!("{}:{}", expected.algorithm, actual),
            });
        }

        tracing::debug!("Verified {} ({})", path.display(), expected);
        Ok(())
    }
}

/// Hex digest of a file, read in 1MB chunks
pub async fn digest_file(path: &Path, algorithm: DigestAlgorithm) -> Result<String> {
    let mut file = File::open(path).await?;
    let mut buffer = vec![0u8; 1024 * 1024]; // 1MB buffer

    match algorithm {
        DigestAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            loop {
                let n = file.read(&mut buffer).await?;
                if n == 0 {
                    break;
                }
                hasher.update(&buffer[..n]);
            }
            Ok(format!("{:x}", hasher.finalize()))
        }
        DigestAlgorithm::Blake3 => {
            let mut hasher = blake3::Hasher::new();
            loop {
                let n = file.read(&mut buffer).await?;
                if n == 0 {
                    break;
                }
                hasher.update(&buffer[..n]);
            }
            Ok(hasher.finalize().to_hex().to_string())
        }
    }
}
