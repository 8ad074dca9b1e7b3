//! # Key Management
//!
//! Ed25519 keypairs for ledger parties and notaries.
//!
//! Every party owns exactly one signing key. Its public half is the
//! `owning_key` that appears inside asset records and command signer sets,
//! so the public key type has to be hashable, orderable and serializable:
//! it is used as a map key all over the flow and notary code.
//!
//! Key bytes are never logged. `Debug` on a keypair prints the public half
//! only.

use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur while decoding key material.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key bytes: expected 32 bytes")]
    InvalidSecretKey,

    #[error("invalid public key bytes: not a valid Ed25519 point")]
    InvalidPublicKey,

    #[error("invalid signature bytes: expected 64 bytes")]
    InvalidSignature,
}

/// A party's signing identity.
///
/// Deliberately not `Serialize`: exporting a secret key should be an
/// explicit call to [`LedgerKeypair::secret_key_bytes`].
pub struct LedgerKeypair {
    signing_key: SigningKey,
}

/// The public half of a party identity.
///
/// Ordered by raw bytes so that signer sets (`BTreeSet<LedgerPublicKey>`)
/// iterate deterministically, which keeps canonical transaction bytes stable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LedgerPublicKey {
    bytes: [u8; 32],
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSignature {
    bytes: Vec<u8>,
}

impl LedgerKeypair {
    /// Generate a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Deterministic keypair from a 32-byte seed. Used by tests and by the
    /// simulation binary to give configured parties stable identities.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Reconstruct a keypair from a hex-encoded secret key.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str).map_err(|_| KeyError::InvalidSecretKey)?;
        let seed: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self::from_seed(&seed))
    }

    /// Returns the public key associated with this keypair.
    pub fn public_key(&self) -> LedgerPublicKey {
        LedgerPublicKey {
            bytes: self.signing_key.verifying_key().to_bytes(),
        }
    }

    /// Sign a message. Ed25519 is deterministic: same key and message give
    /// the same signature.
    pub fn sign(&self, message: &[u8]) -> LedgerSignature {
        LedgerSignature {
            bytes: self.signing_key.sign(message).to_bytes().to_vec(),
        }
    }

    /// Verify a signature against this keypair's public key.
    pub fn verify(&self, message: &[u8], signature: &LedgerSignature) -> bool {
        self.public_key().verify(message, signature)
    }

    /// Exports the raw 32-byte secret key material. Handle with care.
    pub fn secret_key_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl Clone for LedgerKeypair {
    fn clone(&self) -> Self {
        Self::from_seed(&self.signing_key.to_bytes())
    }
}

impl fmt::Debug for LedgerKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LedgerKeypair(pub={})", self.public_key().to_hex())
    }
}

// ---------------------------------------------------------------------------
// LedgerPublicKey
// ---------------------------------------------------------------------------

impl LedgerPublicKey {
    /// Wrap raw bytes without curve validation. Use [`Self::try_from_slice`]
    /// for untrusted input.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Parse and validate a public key from a byte slice.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; 32] = slice.try_into().map_err(|_| KeyError::InvalidPublicKey)?;
        VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self { bytes })
    }

    /// Parse a hex-encoded public key.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s).map_err(|_| KeyError::InvalidPublicKey)?;
        Self::try_from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Returns `true` if `signature` is a valid signature of `message` by
    /// this key. Malformed keys or signatures simply fail.
    pub fn verify(&self, message: &[u8], signature: &LedgerSignature) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };
        let Some(dalek_sig) = signature.to_dalek_signature() else {
            return false;
        };
        verifying_key.verify(message, &dalek_sig).is_ok()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// First eight hex characters, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.bytes[..4])
    }
}

impl fmt::Display for LedgerPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for LedgerPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LedgerPublicKey({})", self.short())
    }
}

// ---------------------------------------------------------------------------
// LedgerSignature
// ---------------------------------------------------------------------------

impl LedgerSignature {
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// `None` if the stored bytes are not exactly 64 long.
    pub fn to_dalek_signature(&self) -> Option<DalekSignature> {
        let arr: [u8; 64] = self.bytes.as_slice().try_into().ok()?;
        Some(DalekSignature::from_bytes(&arr))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s).map_err(|_| KeyError::InvalidSignature)?;
        if bytes.len() != 64 {
            return Err(KeyError::InvalidSignature);
        }
        Ok(Self { bytes })
    }
}

impl fmt::Debug for LedgerSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex_str = self.to_hex();
        if hex_str.len() >= 16 {
            write!(f, "LedgerSignature({}..)", &hex_str[..16])
        } else {
            write!(f, "LedgerSignature({})", hex_str)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn sign_verify_roundtrip() {
        let kp = LedgerKeypair::generate();
        let sig = kp.sign(b"issue thought");
        assert!(kp.verify(b"issue thought", &sig));
        assert!(!kp.verify(b"move thought", &sig));
    }

    #[test]
    fn wrong_key_fails_verification() {
        let kp1 = LedgerKeypair::generate();
        let kp2 = LedgerKeypair::generate();
        let sig = kp1.sign(b"message");
        assert!(!kp2.public_key().verify(b"message", &sig));
    }

    #[test]
    fn seeded_keypairs_are_stable() {
        let a = LedgerKeypair::from_seed(&[7u8; 32]);
        let b = LedgerKeypair::from_seed(&[7u8; 32]);
        assert_eq!(a.public_key(), b.public_key());
        assert_eq!(a.sign(b"x"), b.sign(b"x"));
    }

    #[test]
    fn hex_roundtrips() {
        let kp = LedgerKeypair::generate();
        let restored = LedgerKeypair::from_hex(&hex::encode(kp.secret_key_bytes())).unwrap();
        assert_eq!(kp.public_key(), restored.public_key());

        let pk = LedgerPublicKey::from_hex(&kp.public_key().to_hex()).unwrap();
        assert_eq!(pk, kp.public_key());

        let sig = kp.sign(b"m");
        assert_eq!(LedgerSignature::from_hex(&sig.to_hex()).unwrap(), sig);
    }

    #[test]
    fn rejects_malformed_key_material() {
        assert!(LedgerKeypair::from_hex("deadbeef").is_err());
        assert!(LedgerPublicKey::try_from_slice(&[0u8; 16]).is_err());
        assert!(LedgerSignature::from_hex("abcd").is_err());
    }

    #[test]
    fn truncated_signature_never_verifies() {
        let kp = LedgerKeypair::generate();
        let sig = LedgerSignature {
            bytes: vec![1u8; 10],
        };
        assert!(!kp.verify(b"m", &sig));
    }

    #[test]
    fn public_keys_order_deterministically() {
        let keys: Vec<_> = (0..5u8)
            .map(|i| LedgerKeypair::from_seed(&[i; 32]).public_key())
            .collect();
        let a: BTreeSet<_> = keys.iter().copied().collect();
        let b: BTreeSet<_> = keys.iter().rev().copied().collect();
        assert_eq!(
            a.into_iter().collect::<Vec<_>>(),
            b.into_iter().collect::<Vec<_>>()
        );
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let kp = LedgerKeypair::generate();
        let debug_str = format!("{:?}", kp);
        assert!(debug_str.starts_with("LedgerKeypair(pub="));
        assert!(!debug_str.contains(&hex::encode(kp.secret_key_bytes())));
    }
}
