//! Core type definitions for ledger transactions.
//!
//! Commands, time windows and attached signatures. These are the pieces of a
//! [`TransactionProposal`](super::builder::TransactionProposal) that are not
//! asset state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use crate::crypto::keys::{LedgerPublicKey, LedgerSignature};

// ---------------------------------------------------------------------------
// CommandKind
// ---------------------------------------------------------------------------

/// What a transaction claims to do with its asset records.
///
/// Closed on purpose: every contract check matches on it exhaustively, so a
/// new kind cannot slip through verification unhandled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    /// Create a brand-new record.
    Issue,
    /// Change the owner of an existing record.
    Move,
    /// Retire a record. Declared for completeness; the asset contract does
    /// not support it and rejects any transaction that carries it.
    Exit,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Issue => write!(f, "Issue"),
            Self::Move => write!(f, "Move"),
            Self::Exit => write!(f, "Exit"),
        }
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A command plus the keys that must sign for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub kind: CommandKind,
    pub signers: BTreeSet<LedgerPublicKey>,
}

impl Command {
    pub fn new(kind: CommandKind, signers: impl IntoIterator<Item = LedgerPublicKey>) -> Self {
        Self {
            kind,
            signers: signers.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// TimeWindow
// ---------------------------------------------------------------------------

/// Validity interval of a proposal. Either bound may be open.
///
/// `from` is inclusive, `until` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn between(from: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            until: Some(until),
        }
    }

    pub fn until_only(until: DateTime<Utc>) -> Self {
        Self {
            from: None,
            until: Some(until),
        }
    }

    /// `[start, start + duration)`.
    pub fn starting_at(start: DateTime<Utc>, duration: Duration) -> Self {
        let until = chrono::Duration::from_std(duration)
            .ok()
            .and_then(|span| start.checked_add_signed(span))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self::between(start, until)
    }

    /// `true` once `now` has reached the upper bound.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.until.is_some_and(|until| now >= until)
    }

    /// `true` while `now` is still before the lower bound.
    pub fn is_pending_at(&self, now: DateTime<Utc>) -> bool {
        self.from.is_some_and(|from| now < from)
    }

    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired_at(now) && !self.is_pending_at(now)
    }

    pub(crate) fn write_canonical(&self, buf: &mut Vec<u8>) {
        for bound in [self.from, self.until] {
            match bound {
                Some(t) => {
                    buf.push(0x01);
                    buf.extend_from_slice(&t.timestamp().to_le_bytes());
                    buf.extend_from_slice(&t.timestamp_subsec_nanos().to_le_bytes());
                }
                None => buf.push(0x00),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TransactionSignature
// ---------------------------------------------------------------------------

/// A party's signature over a proposal id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSignature {
    pub by: LedgerPublicKey,
    pub signature: LedgerSignature,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
