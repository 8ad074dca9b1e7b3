//! # Hashing Utilities
//!
//! Two hash functions, two jobs:
//!
//! - **double SHA-256** for transaction hashes. A proposal's id is computed
//!   once at build time and becomes the committed transaction hash, so it
//!   must be cheap to recompute by every verifier.
//! - **BLAKE3** for party addresses.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 digest as a fixed-size array.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// `SHA-256(SHA-256(data))`.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// BLAKE3 digest of the input.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

// ---------------------------------------------------------------------------
// TxHash
// ---------------------------------------------------------------------------

/// Identifier of a proposal and, once committed, of the ledger transaction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxHash([u8; 32]);

impl TxHash {
    /// Hash canonical transaction bytes.
    pub fn of(bytes: &[u8]) -> Self {
        Self(double_sha256(bytes))
    }

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", &self.to_hex()[..12])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        // SHA-256("abc")
        assert_eq!(
            hex::encode(sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn double_sha256_differs_from_single() {
        assert_ne!(sha256(b"thought"), double_sha256(b"thought"));
        assert_eq!(double_sha256(b"thought"), sha256(&sha256(b"thought")));
    }

    #[test]
    fn tx_hash_is_deterministic() {
        assert_eq!(TxHash::of(b"tx"), TxHash::of(b"tx"));
        assert_ne!(TxHash::of(b"tx-1"), TxHash::of(b"tx-2"));
        assert_eq!(TxHash::of(b"tx").to_hex().len(), 64);
    }

    #[test]
    fn blake3_is_not_sha256() {
        assert_ne!(blake3_hash(b"abc"), sha256(b"abc"));
    }
}
