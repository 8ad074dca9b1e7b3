//! References into the committed ledger.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::record::AssetRecord;
use crate::crypto::hash::TxHash;

/// Points at output `output_index` of committed transaction `tx_hash`.
///
/// A plain lookup key. It owns nothing and stays valid after the state it
/// names has been consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateRef {
    pub tx_hash: TxHash,
    pub output_index: u32,
}

impl StateRef {
    pub fn new(tx_hash: TxHash, output_index: u32) -> Self {
        Self {
            tx_hash,
            output_index,
        }
    }
}

impl fmt::Display for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.tx_hash, self.output_index)
    }
}

/// A committed record together with the reference it lives at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateAndRecord {
    pub state_ref: StateRef,
    pub record: AssetRecord,
}

impl StateAndRecord {
    pub fn new(state_ref: StateRef, record: AssetRecord) -> Self {
        Self { state_ref, record }
    }
}
