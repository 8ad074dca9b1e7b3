//! Ledger parties.
//!
//! A [`Party`] is a well-known name bound to an Ed25519 owning key. Records
//! reference parties by value; contract checks and signature checks compare
//! the `owning_key`, never the name.

use bech32::{Bech32, Hrp};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::PARTY_HRP;
use crate::crypto::hash::blake3_hash;
use crate::crypto::keys::{LedgerKeypair, LedgerPublicKey};

/// A named ledger participant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Party {
    pub name: String,
    pub owning_key: LedgerPublicKey,
}

impl Party {
    pub fn new(name: impl Into<String>, owning_key: LedgerPublicKey) -> Self {
        Self {
            name: name.into(),
            owning_key,
        }
    }

    /// Party for the public half of `keypair`.
    pub fn from_keypair(name: impl Into<String>, keypair: &LedgerKeypair) -> Self {
        Self::new(name, keypair.public_key())
    }

    /// Checksummed `party1…` address derived from the BLAKE3 hash of the
    /// owning key. Display only; lookups go through the key itself.
    pub fn address(&self) -> String {
        let digest = blake3_hash(self.owning_key.as_bytes());
        let hrp = Hrp::parse_unchecked(PARTY_HRP);
        bech32::encode::<Bech32>(hrp, &digest[..20]).unwrap_or_else(|_| self.owning_key.to_hex())
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
