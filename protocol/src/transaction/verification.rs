//! The asset contract: structural and authorization checks on a proposal.
//!
//! [`verify`] is a pure function. The initiator runs it before signing,
//! every counterparty runs it again before co-signing, and the sequencer
//! runs it once more before committing. Same proposal, same answer.
//!
//! Inputs and outputs are partitioned into lineage groups keyed by
//! `(content, issuer)`. Within a group the command decides the rule:
//!
//! | Command | Rule |
//! |---------|------|
//! | `Move`  | one input, owner signed, one output |
//! | `Issue` | one output, bounded time window, issuer signed, non-empty content, no inputs |
//! | `Exit`  | not supported by this contract |
//!
//! Because grouping already fixes content and issuer, a Move whose output
//! differs from its input in anything but `owner` splits into two groups and
//! fails the single-input / single-output checks.

use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use super::builder::TransactionProposal;
use super::types::CommandKind;
use crate::asset::{AssetRecord, LineageKey, StateAndRecord};
use crate::crypto::keys::LedgerPublicKey;
use crate::crypto::signatures::{verify_all, SignatureError};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Contract violations. Always the caller's problem to fix; never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationFailure {
    #[error("transaction has neither inputs nor outputs")]
    NoStates,

    /// Zero commands, several commands, or a command this contract does not
    /// support.
    #[error("unrecognized command: {0}")]
    UnrecognizedCommand(String),

    #[error("move of \"{content}\" must consume exactly one input, found {found}")]
    NotSingleInput { content: String, found: usize },

    #[error("move of \"{content}\" is not signed by current owner {owner}")]
    MissingOwnerSignature { content: String, owner: String },

    #[error("move of \"{content}\" must produce exactly one output, found {found}")]
    StateNotPropagated { content: String, found: usize },

    #[error("issue of \"{content}\" must produce exactly one output, found {found}")]
    NotSingleOutput { content: String, found: usize },

    #[error("issuance must carry a time window with an upper bound")]
    MissingTimestamp,

    #[error("issue of \"{content}\" is not signed by issuer {issuer}")]
    UnauthorizedIssuer { content: String, issuer: String },

    #[error("issued content must not be empty")]
    EmptyContent,

    #[error("\"{content}\" has already been issued: issuance consumes {found} input(s)")]
    ReissueAttempt { content: String, found: usize },

    #[error("invalid signature from {0}")]
    InvalidSignature(String),
}

// ---------------------------------------------------------------------------
// Lineage grouping
// ---------------------------------------------------------------------------

/// Inputs and outputs of one lineage inside a proposal.
#[derive(Debug, Default)]
pub struct LineageGroup<'a> {
    pub inputs: Vec<&'a StateAndRecord>,
    pub outputs: Vec<&'a AssetRecord>,
}

/// Partition a proposal's states by [`LineageKey`]. Deterministic order.
pub fn group_by_lineage(proposal: &TransactionProposal) -> BTreeMap<LineageKey, LineageGroup<'_>> {
    let mut groups: BTreeMap<LineageKey, LineageGroup<'_>> = BTreeMap::new();
    for input in &proposal.inputs {
        groups
            .entry(input.record.lineage())
            .or_default()
            .inputs
            .push(input);
    }
    for output in &proposal.outputs {
        groups.entry(output.lineage()).or_default().outputs.push(output);
    }
    groups
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Check `proposal` against the asset contract, treating `signer_keys` as
/// the keys that have signed (or will sign) it.
///
/// # Errors
///
/// The first failing rule, in the order: state presence, command count,
/// then per lineage group in key order.
pub fn verify(
    proposal: &TransactionProposal,
    signer_keys: &BTreeSet<LedgerPublicKey>,
) -> Result<(), VerificationFailure> {
    if proposal.inputs.is_empty() && proposal.outputs.is_empty() {
        return Err(VerificationFailure::NoStates);
    }

    let command = match proposal.commands.as_slice() {
        [only] => only,
        [] => {
            return Err(VerificationFailure::UnrecognizedCommand(
                "no command".to_string(),
            ))
        }
        many => {
            return Err(VerificationFailure::UnrecognizedCommand(format!(
                "expected exactly one command, found {}",
                many.len()
            )))
        }
    };

    for (lineage, group) in group_by_lineage(proposal) {
        match command.kind {
            CommandKind::Move => verify_move(&lineage, &group, signer_keys)?,
            CommandKind::Issue => verify_issue(proposal, &lineage, &group, signer_keys)?,
            CommandKind::Exit => {
                return Err(VerificationFailure::UnrecognizedCommand(
                    CommandKind::Exit.to_string(),
                ))
            }
        }
    }

    Ok(())
}

/// [`verify`] against the proposal's own required signer set.
pub fn verify_proposal(proposal: &TransactionProposal) -> Result<(), VerificationFailure> {
    verify(proposal, &proposal.required_signers())
}

fn verify_move(
    lineage: &LineageKey,
    group: &LineageGroup<'_>,
    signer_keys: &BTreeSet<LedgerPublicKey>,
) -> Result<(), VerificationFailure> {
    let [input] = group.inputs.as_slice() else {
        return Err(VerificationFailure::NotSingleInput {
            content: lineage.content.clone(),
            found: group.inputs.len(),
        });
    };

    let owner = &input.record.owner;
    if !signer_keys.contains(&owner.owning_key) {
        return Err(VerificationFailure::MissingOwnerSignature {
            content: lineage.content.clone(),
            owner: owner.name.clone(),
        });
    }

    if group.outputs.len() != 1 {
        return Err(VerificationFailure::StateNotPropagated {
            content: lineage.content.clone(),
            found: group.outputs.len(),
        });
    }

    Ok(())
}

fn verify_issue(
    proposal: &TransactionProposal,
    lineage: &LineageKey,
    group: &LineageGroup<'_>,
    signer_keys: &BTreeSet<LedgerPublicKey>,
) -> Result<(), VerificationFailure> {
    let [output] = group.outputs.as_slice() else {
        return Err(VerificationFailure::NotSingleOutput {
            content: lineage.content.clone(),
            found: group.outputs.len(),
        });
    };

    if !proposal
        .time_window
        .is_some_and(|window| window.until.is_some())
    {
        return Err(VerificationFailure::MissingTimestamp);
    }

    if !signer_keys.contains(&output.issuer.owning_key) {
        return Err(VerificationFailure::UnauthorizedIssuer {
            content: lineage.content.clone(),
            issuer: output.issuer.name.clone(),
        });
    }

    if output.content.is_empty() {
        return Err(VerificationFailure::EmptyContent);
    }

    if !group.inputs.is_empty() {
        return Err(VerificationFailure::ReissueAttempt {
            content: lineage.content.clone(),
            found: group.inputs.len(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Signatures
// ---------------------------------------------------------------------------

/// Check every attached signature against the proposal id.
///
/// Does not check completeness; see [`missing_signatures`].
pub fn verify_signatures(proposal: &TransactionProposal) -> Result<(), VerificationFailure> {
    let id = proposal.compute_id();
    verify_all(
        id.as_bytes(),
        proposal.signatures.iter().map(|s| (&s.by, &s.signature)),
    )
    .map_err(|SignatureError::VerificationFailed(key)| VerificationFailure::InvalidSignature(key))
}

/// Required signers that have not signed yet.
pub fn missing_signatures(proposal: &TransactionProposal) -> BTreeSet<LedgerPublicKey> {
    let signed = proposal.signed_by();
    proposal
        .required_signers()
        .into_iter()
        .filter(|key| !signed.contains(key))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
