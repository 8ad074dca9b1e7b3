//! Commit failures.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::asset::StateRef;
use crate::crypto::hash::TxHash;
use crate::transaction::VerificationFailure;

/// Why a proposal did not make it onto the ledger.
///
/// On any of these nothing was persisted. `Conflict` is the only one where
/// rebuilding against fresh inputs can succeed; the rest are terminal for
/// the proposal as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommitFailure {
    /// Lost the race for an input.
    #[error("input {state_ref} was already consumed by transaction {consumed_by}")]
    Conflict {
        state_ref: StateRef,
        consumed_by: TxHash,
    },

    #[error("time window closed at {until}, submitted at {now}")]
    ExpiredTimeWindow {
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    #[error("time window opens at {from}, submitted at {now}")]
    TimeWindowNotYetValid {
        from: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    #[error("proposal names notary {named}, but this notary is {actual}")]
    WrongNotary { named: String, actual: String },

    #[error("input {0} does not exist on the ledger")]
    UnknownInput(StateRef),

    #[error("input {0} does not match the committed record")]
    InputMismatch(StateRef),

    #[error("\"{content}\" issued by {issuer} is already on the ledger")]
    DuplicateIssuance { content: String, issuer: String },

    #[error("proposal id {actual} does not match its contents ({expected})")]
    IdMismatch { expected: TxHash, actual: TxHash },

    #[error("missing signatures from {} required signer(s)", .0.len())]
    MissingSignatures(Vec<String>),

    #[error("invalid signature from {0}")]
    InvalidSignature(String),

    #[error("contract rejected proposal: {0}")]
    Invalid(#[from] VerificationFailure),
}
