//! The asset record and its lineage key.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identity::Party;

/// One unit of ledger state: an opaque payload with an issuer and an owner.
///
/// `issuer` is fixed at issuance. A transfer produces a new record that is
/// identical except for `owner`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Opaque payload. Must be non-empty when issued.
    pub content: String,
    pub issuer: Party,
    pub owner: Party,
}

/// Identity-independent grouping key: two records belong to the same
/// lineage iff their content and issuer match, whoever owns them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineageKey {
    pub content: String,
    pub issuer: Party,
}

impl AssetRecord {
    pub fn new(content: impl Into<String>, issuer: Party, owner: Party) -> Self {
        Self {
            content: content.into(),
            issuer,
            owner,
        }
    }

    /// Parties with a stake in this record.
    pub fn participants(&self) -> [&Party; 2] {
        [&self.issuer, &self.owner]
    }

    /// Copy of this record with `owner` replaced.
    pub fn with_owner(&self, new_owner: Party) -> Self {
        Self {
            content: self.content.clone(),
            issuer: self.issuer.clone(),
            owner: new_owner,
        }
    }

    pub fn lineage(&self) -> LineageKey {
        LineageKey {
            content: self.content.clone(),
            issuer: self.issuer.clone(),
        }
    }

    /// Canonical bytes for inclusion in a transaction's signable form.
    pub(crate) fn write_canonical(&self, buf: &mut Vec<u8>) {
        write_str(&self.content, buf);
        write_party(&self.issuer, buf);
        write_party(&self.owner, buf);
    }
}

/// u32 little-endian byte length, then the UTF-8 bytes.
pub(crate) fn write_str(s: &str, buf: &mut Vec<u8>) {
    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

pub(crate) fn write_party(party: &Party, buf: &mut Vec<u8>) {
    write_str(&party.name, buf);
    buf.extend_from_slice(party.owning_key.as_bytes());
}

impl fmt::Display for AssetRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\"{}\" (issuer={}, owner={})",
            self.content, self.issuer, self.owner
        )
    }
}
