//! Turning a fully signed proposal into a ledger entry.
//!
//! The [`LedgerCommitter`] checks the proposal locally, hands it to the
//! [`Sequencer`], and on acceptance tells every registered [`VaultObserver`].
//! On rejection the failure goes straight back to the caller. There is no
//! retry here: whether to rebuild against fresh inputs is the caller's call.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::error::CommitFailure;
use super::sequencer::{NotarisationRequest, Sequencer};
use crate::asset::{StateAndRecord, StateRef};
use crate::crypto::hash::TxHash;
use crate::identity::Party;
use crate::transaction::{
    missing_signatures, verify_signatures, TransactionProposal, TransactionSignature,
    VerificationFailure,
};

// ---------------------------------------------------------------------------
// CommittedTransaction
// ---------------------------------------------------------------------------

/// A proposal the notary accepted. Permanent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommittedTransaction {
    pub tx_hash: TxHash,
    pub proposal: TransactionProposal,
    pub notary_signature: TransactionSignature,
    pub committed_at: DateTime<Utc>,
}

impl CommittedTransaction {
    /// Output `index` together with the reference it now lives at.
    pub fn output(&self, index: usize) -> Option<StateAndRecord> {
        self.proposal
            .outputs
            .get(index)
            .map(|record| StateAndRecord::new(StateRef::new(self.tx_hash, index as u32), record.clone()))
    }

    pub fn outputs(&self) -> Vec<StateAndRecord> {
        (0..self.proposal.outputs.len())
            .filter_map(|i| self.output(i))
            .collect()
    }

    pub fn consumed(&self) -> Vec<StateRef> {
        self.proposal.input_refs()
    }
}

// ---------------------------------------------------------------------------
// VaultObserver
// ---------------------------------------------------------------------------

/// Anything that wants to hear about committed transactions.
#[async_trait]
pub trait VaultObserver: Send + Sync {
    async fn on_committed(&self, tx: &CommittedTransaction);
}

// ---------------------------------------------------------------------------
// LedgerCommitter
// ---------------------------------------------------------------------------

pub struct LedgerCommitter {
    sequencer: Arc<dyn Sequencer>,
    observers: RwLock<Vec<Arc<dyn VaultObserver>>>,
}

impl LedgerCommitter {
    pub fn new(sequencer: Arc<dyn Sequencer>) -> Self {
        Self {
            sequencer,
            observers: RwLock::new(Vec::new()),
        }
    }

    /// The notary proposals committed through here must name.
    pub fn notary(&self) -> &Party {
        self.sequencer.identity()
    }

    pub fn register_observer(&self, observer: Arc<dyn VaultObserver>) {
        self.observers.write().push(observer);
    }

    /// Commit a fully signed proposal.
    ///
    /// # Errors
    ///
    /// `MissingSignatures` / `InvalidSignature` if the local check fails,
    /// otherwise whatever the sequencer rejected it with. Nothing is
    /// persisted or announced on any error.
    pub async fn commit(
        &self,
        proposal: &TransactionProposal,
    ) -> Result<CommittedTransaction, CommitFailure> {
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

        let receipt = self
            .sequencer
            .notarise(NotarisationRequest::new(proposal.clone()))
            .await
            .map_err(|e| {
                warn!(tx = %proposal.id, error = %e, "commit failed");
                e
            })?;

        let committed = CommittedTransaction {
            tx_hash: receipt.tx_hash,
            proposal: proposal.clone(),
            notary_signature: receipt.notary_signature,
            committed_at: receipt.committed_at,
        };

        // Snapshot so no lock is held across the awaits below.
        let observers: Vec<_> = self.observers.read().iter().cloned().collect();
        for observer in &observers {
            observer.on_committed(&committed).await;
        }

        info!(
            tx = %committed.tx_hash,
            observers = observers.len(),
            "transaction committed"
        );
        Ok(committed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
