//! Flow errors.

use thiserror::Error;

use crate::asset::StateRef;
use crate::notary::CommitFailure;
use crate::transaction::VerificationFailure;

/// Failures of the signature exchange itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolFailure {
    /// A counterparty looked at the proposal and said no.
    #[error("{party} refused to sign: {reason}")]
    CounterpartyRefused { party: String, reason: String },

    /// Not every counterparty answered in time. No decision was made.
    #[error("counterparties did not answer within {waited_ms}ms")]
    Timeout { waited_ms: u64 },

    /// A required signer is not in the party directory.
    #[error("no known party for signer {0}")]
    UnknownCounterparty(String),

    /// The counterparty's inbox is gone or it hung up without answering.
    #[error("{0} is not reachable")]
    CounterpartyUnavailable(String),

    #[error("{0} returned a signature that does not verify")]
    InvalidCounterpartySignature(String),

    /// The initiator tried to move a state someone else owns.
    #[error("{state_ref} is owned by {owner}")]
    NotOwner { state_ref: StateRef, owner: String },

    #[error("still missing signatures from {} signer(s) after collection", .0.len())]
    MissingSignatures(Vec<String>),
}

/// Everything a flow can fail with, as returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error("verification failed: {0}")]
    Verification(#[from] VerificationFailure),

    #[error("commit failed: {0}")]
    Commit(#[from] CommitFailure),

    #[error("signing protocol failed: {0}")]
    Protocol(#[from] ProtocolFailure),
}
