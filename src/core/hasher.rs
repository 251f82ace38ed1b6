//! Content digests for audit correlation.
//!
//! Digests are attached to every inspection outcome so that log lines can be
//! correlated with stored objects. They are never used for security
//! decisions. SHA-256 is the default; MD5, SHA-1, SHA-512 and BLAKE3 are
//! available for compatibility with whatever the surrounding system records.

use serde::{Deserialize, Serialize};
use sha2::Digest as _;
use std::fmt;

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    /// SHA-256 (default).
    #[default]
    Sha256,
    /// SHA-512.
    Sha512,
    /// SHA-1.
    Sha1,
    /// MD5.
    Md5,
    /// BLAKE3.
    Blake3,
}

impl DigestAlgorithm {
    /// Resolves an algorithm by name. Unknown names fall back to SHA-256.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "sha512" | "sha-512" => Self::Sha512,
            "sha1" | "sha-1" => Self::Sha1,
            "md5" => Self::Md5,
            "blake3" => Self::Blake3,
            _ => Self::Sha256,
        }
    }

    /// Returns the canonical lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
            Self::Sha1 => "sha1",
            Self::Md5 => "md5",
            Self::Blake3 => "blake3",
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Computes hex digests of request bodies.
///
/// # Examples
///
/// ```rust
/// use clamgate::core::{BodyHasher, DigestAlgorithm};
///
/// let hasher = BodyHasher::new(DigestAlgorithm::Sha256);
/// assert_eq!(
///     hasher.digest(b"hello world"),
///     "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
/// );
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BodyHasher {
    algorithm: DigestAlgorithm,
}

impl BodyHasher {
    /// Creates a hasher for the given algorithm.
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self { algorithm }
    }

    /// Returns the configured algorithm.
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Returns the lowercase hex digest of `data`.
    pub fn digest(&self, data: &[u8]) -> String {
        match self.algorithm {
            DigestAlgorithm::Sha256 => hex::encode(sha2::Sha256::digest(data)),
            DigestAlgorithm::Sha512 => hex::encode(sha2::Sha512::digest(data)),
            DigestAlgorithm::Sha1 => hex::encode(sha1::Sha1::digest(data)),
            DigestAlgorithm::Md5 => hex::encode(md5::Md5::digest(data)),
            DigestAlgorithm::Blake3 => blake3::hash(data).to_hex().to_string(),
        }
    }
}

/// Convenience function for one-off digests.
pub fn digest(algorithm: DigestAlgorithm, data: &[u8]) -> String {
    BodyHasher::new(algorithm).digest(data)
}
