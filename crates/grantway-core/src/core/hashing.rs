// crates/grantway-core/src/core/hashing.rs
// ============================================================================
// Module: Grantway Hashing
// Description: Canonical content hashing for policy fingerprints.
// Purpose: Bind appeals to the exact policy document version they were evaluated against.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Policy documents are fingerprinted by serializing them to JCS canonical
//! JSON and hashing the resulting bytes. Fingerprints are stable across map
//! key order and formatting so a (policy id, version) pair can be verified
//! unchanged after the fact.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::fmt::Write as _;

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Hash Algorithm
// ============================================================================

/// Hash algorithm used for content digests.
///
/// # Invariants
/// - Variants are stable for serialization and fingerprint comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// SHA-256.
    #[serde(rename = "sha-256")]
    Sha256,
}

/// Default hash algorithm for policy fingerprints.
pub const DEFAULT_HASH_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

impl HashAlgorithm {
    /// Returns the stable wire label for the algorithm.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha-256",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Hash Digest
// ============================================================================

/// Content digest with its producing algorithm.
///
/// # Invariants
/// - `hex` is the lowercase hex encoding of the digest bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashDigest {
    /// Algorithm that produced the digest.
    pub algorithm: HashAlgorithm,
    /// Lowercase hex encoding of the digest bytes.
    pub hex: String,
}

impl fmt::Display for HashDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

// ============================================================================
// SECTION: Hash Errors
// ============================================================================

/// Errors raised while producing canonical hashes.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum HashError {
    /// Canonical serialization failed.
    #[error("canonicalizing value for hashing: {0}")]
    Canonicalize(String),
}

// ============================================================================
// SECTION: Hash Functions
// ============================================================================

/// Hashes raw bytes with the given algorithm.
#[must_use]
pub fn hash_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> HashDigest {
    match algorithm {
        HashAlgorithm::Sha256 => {
            let digest = Sha256::digest(bytes);
            HashDigest {
                algorithm,
                hex: to_hex(&digest),
            }
        }
    }
}

/// Hashes a serializable value via JCS canonical JSON.
///
/// # Errors
///
/// Returns [`HashError`] when the value cannot be canonically serialized.
pub fn hash_canonical_value<T: Serialize>(
    algorithm: HashAlgorithm,
    value: &T,
) -> Result<HashDigest, HashError> {
    let canonical =
        serde_jcs::to_string(value).map_err(|err| HashError::Canonicalize(err.to_string()))?;
    Ok(hash_bytes(algorithm, canonical.as_bytes()))
}

/// Encodes bytes as lowercase hex.
fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        // Infallible for String targets.
        let _ = write!(out, "{byte:02x}");
    }
    out
}
