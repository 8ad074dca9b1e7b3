//! # Digital Signatures
//!
//! Thin wrappers over the keypair operations so that the rest of the crate
//! has one place that signs and one place that verifies.

use thiserror::Error;

use super::keys::{LedgerKeypair, LedgerPublicKey, LedgerSignature};

/// Errors during signature operations.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("signature verification failed for key {0}")]
    VerificationFailed(String),
}

/// Sign a message with a party keypair.
pub fn sign(keypair: &LedgerKeypair, message: &[u8]) -> LedgerSignature {
    keypair.sign(message)
}

/// Verify a single signature.
pub fn verify(public_key: &LedgerPublicKey, message: &[u8], signature: &LedgerSignature) -> bool {
    public_key.verify(message, signature)
}

/// Verify several signatures over the same message.
///
/// Fails on the first bad signature and names its key, so callers can tell
/// which party produced garbage.
pub fn verify_all<'a, I>(message: &[u8], items: I) -> Result<(), SignatureError>
where
    I: IntoIterator<Item = (&'a LedgerPublicKey, &'a LedgerSignature)>,
{
    for (key, signature) in items {
        if !verify(key, message, signature) {
            return Err(SignatureError::VerificationFailed(key.to_hex()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let kp = LedgerKeypair::generate();
        let sig = sign(&kp, b"hello");
        assert!(verify(&kp.public_key(), b"hello", &sig));
    }

    #[test]
    fn verify_all_accepts_valid_set() {
        let kps: Vec<_> = (0..4).map(|_| LedgerKeypair::generate()).collect();
        let msg = b"same message for everyone";
        let pairs: Vec<_> = kps.iter().map(|k| (k.public_key(), sign(k, msg))).collect();
        assert!(verify_all(msg, pairs.iter().map(|(k, s)| (k, s))).is_ok());
    }

    #[test]
    fn verify_all_names_the_bad_key() {
        let good = LedgerKeypair::generate();
        let bad = LedgerKeypair::generate();
        let msg = b"m";
        let good_sig = sign(&good, msg);
        let forged = sign(&good, msg);
        let good_pk = good.public_key();
        let bad_pk = bad.public_key();

        let err = verify_all(msg, [(&good_pk, &good_sig), (&bad_pk, &forged)]).unwrap_err();
        let SignatureError::VerificationFailed(key) = err;
        assert_eq!(key, bad_pk.to_hex());
    }

    #[test]
    fn verify_all_empty_is_ok() {
        assert!(verify_all(b"m", std::iter::empty()).is_ok());
    }
}
