//! # Cryptographic Primitives
//!
//! Ed25519 for party signatures, double SHA-256 for transaction hashes and
//! BLAKE3 for party addresses. Everything here wraps audited crates; nothing
//! is implemented from scratch.

pub mod hash;
pub mod keys;
pub mod signatures;

pub use hash::{blake3_hash, double_sha256, sha256, TxHash};
pub use keys::{KeyError, LedgerKeypair, LedgerPublicKey, LedgerSignature};
pub use signatures::{sign, verify, verify_all, SignatureError};
