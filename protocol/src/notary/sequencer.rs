//! The sequencing authority.
//!
//! A [`Sequencer`] is the one trusted party that decides the order of
//! conflicting spends. The committer talks to it through a request/response
//! seam and never looks inside. [`InMemorySequencer`] is the reference
//! implementation: a validating notary that keeps the whole ledger in a
//! single mutex-guarded map.
//!
//! Everything that depends on ledger state happens under that one lock, so
//! "retire this input iff nobody retired it first" is a compare-and-swap.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use super::error::CommitFailure;
use crate::asset::{AssetRecord, LineageKey, StateAndRecord, StateRef};
use crate::crypto::hash::TxHash;
use crate::crypto::keys::LedgerKeypair;
use crate::identity::Party;
use crate::transaction::{
    missing_signatures, signature_over, verify_proposal, verify_signatures, CommandKind,
    TransactionProposal, TransactionSignature, VerificationFailure,
};

// ---------------------------------------------------------------------------
// Request / Receipt
// ---------------------------------------------------------------------------

/// What the committer hands the sequencer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotarisationRequest {
    /// The states the proposal consumes.
    pub consumed: Vec<StateRef>,
    pub proposal: TransactionProposal,
}

impl NotarisationRequest {
    pub fn new(proposal: TransactionProposal) -> Self {
        Self {
            consumed: proposal.input_refs(),
            proposal,
        }
    }
}

/// Proof of acceptance: the final hash, signed by the notary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotarisationReceipt {
    pub tx_hash: TxHash,
    pub notary_signature: TransactionSignature,
    pub committed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Sequencer
// ---------------------------------------------------------------------------

/// A trusted authority that serializes conflicting spends.
///
/// Implementations must be atomic: either every input is retired and every
/// output created, or the ledger is unchanged.
#[async_trait]
pub trait Sequencer: Send + Sync {
    /// The party proposals must name as their notary.
    fn identity(&self) -> &Party;

    async fn notarise(
        &self,
        request: NotarisationRequest,
    ) -> Result<NotarisationReceipt, CommitFailure>;
}

// ---------------------------------------------------------------------------
// InMemorySequencer
// ---------------------------------------------------------------------------

#[derive(Default)]
struct LedgerState {
    unspent: HashMap<StateRef, AssetRecord>,
    consumed: HashMap<StateRef, TxHash>,
    transactions: HashMap<TxHash, TransactionProposal>,
    issued: HashSet<LineageKey>,
}

/// Validating notary backed by process memory.
pub struct InMemorySequencer {
    identity: Party,
    keypair: LedgerKeypair,
    ledger: Mutex<LedgerState>,
}

impl InMemorySequencer {
    pub fn new(name: impl Into<String>, keypair: LedgerKeypair) -> Self {
        Self {
            identity: Party::from_keypair(name, &keypair),
            keypair,
            ledger: Mutex::new(LedgerState::default()),
        }
    }

    /// The committed record at `state_ref`, if it is still unspent.
    pub fn resolve(&self, state_ref: &StateRef) -> Option<StateAndRecord> {
        self.ledger
            .lock()
            .unspent
            .get(state_ref)
            .map(|record| StateAndRecord::new(*state_ref, record.clone()))
    }

    /// The transaction that consumed `state_ref`, if any.
    pub fn consumed_by(&self, state_ref: &StateRef) -> Option<TxHash> {
        self.ledger.lock().consumed.get(state_ref).copied()
    }

    pub fn is_consumed(&self, state_ref: &StateRef) -> bool {
        self.consumed_by(state_ref).is_some()
    }

    /// A committed transaction by hash.
    pub fn transaction(&self, tx_hash: &TxHash) -> Option<TransactionProposal> {
        self.ledger.lock().transactions.get(tx_hash).cloned()
    }

    pub fn transaction_count(&self) -> usize {
        self.ledger.lock().transactions.len()
    }

    pub fn unspent_count(&self) -> usize {
        self.ledger.lock().unspent.len()
    }

    /// Every check that does not need ledger state.
    fn check_stateless(
        &self,
        proposal: &TransactionProposal,
        now: DateTime<Utc>,
    ) -> Result<(), CommitFailure> {
        if proposal.notary.owning_key != self.identity.owning_key {
            return Err(CommitFailure::WrongNotary {
                named: proposal.notary.name.clone(),
                actual: self.identity.name.clone(),
            });
        }

        if let Some(window) = proposal.time_window {
            if let Some(until) = window.until.filter(|_| window.is_expired_at(now)) {
                return Err(CommitFailure::ExpiredTimeWindow { until, now });
            }
            if let Some(from) = window.from.filter(|_| window.is_pending_at(now)) {
                return Err(CommitFailure::TimeWindowNotYetValid { from, now });
            }
        }

        let expected = proposal.compute_id();
        if proposal.id != expected {
            return Err(CommitFailure::IdMismatch {
                expected,
                actual: proposal.id,
            });
        }

        verify_proposal(proposal)?;

        verify_signatures(proposal).map_err(|e| match e {
            VerificationFailure::InvalidSignature(key) => CommitFailure::InvalidSignature(key),
            other => CommitFailure::Invalid(other),
        })?;

        let missing = missing_signatures(proposal);
        if !missing.is_empty() {
            return Err(CommitFailure::MissingSignatures(
                missing.iter().map(|k| k.to_hex()).collect(),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl Sequencer for InMemorySequencer {
    fn identity(&self) -> &Party {
        &self.identity
    }

    async fn notarise(
        &self,
        request: NotarisationRequest,
    ) -> Result<NotarisationReceipt, CommitFailure> {
        let proposal = request.proposal;
        let now = Utc::now();

        self.check_stateless(&proposal, now).map_err(|e| {
            warn!(tx = %proposal.id, error = %e, "notarisation rejected");
            e
        })?;

        let is_issue = proposal
            .command()
            .is_some_and(|c| c.kind == CommandKind::Issue);

        {
            let mut ledger = self.ledger.lock();

            for input in &proposal.inputs {
                let state_ref = input.state_ref;
                if let Some(consumed_by) = ledger.consumed.get(&state_ref) {
                    warn!(tx = %proposal.id, input = %state_ref, "double-spend attempt");
                    return Err(CommitFailure::Conflict {
                        state_ref,
                        consumed_by: *consumed_by,
                    });
                }
                match ledger.unspent.get(&state_ref) {
                    None => return Err(CommitFailure::UnknownInput(state_ref)),
                    Some(record) if record != &input.record => {
                        return Err(CommitFailure::InputMismatch(state_ref))
                    }
                    Some(_) => {}
                }
            }

            if is_issue {
                if let Some(dup) = proposal
                    .outputs
                    .iter()
                    .find(|o| ledger.issued.contains(&o.lineage()))
                {
                    return Err(CommitFailure::DuplicateIssuance {
                        content: dup.content.clone(),
                        issuer: dup.issuer.name.clone(),
                    });
                }
            }

            for state_ref in proposal.input_refs() {
                ledger.unspent.remove(&state_ref);
                ledger.consumed.insert(state_ref, proposal.id);
            }
            for (state_ref, output) in proposal.output_refs().zip(&proposal.outputs) {
                ledger.unspent.insert(state_ref, output.clone());
                if is_issue {
                    ledger.issued.insert(output.lineage());
                }
            }
            ledger.transactions.insert(proposal.id, proposal.clone());
        }

        info!(
            tx = %proposal.id,
            inputs = proposal.inputs.len(),
            outputs = proposal.outputs.len(),
            "transaction notarised"
        );
        debug!(notary = %self.identity.address(), "signing receipt");

        Ok(NotarisationReceipt {
            tx_hash: proposal.id,
            notary_signature: signature_over(&proposal.id, &self.keypair),
            committed_at: now,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
