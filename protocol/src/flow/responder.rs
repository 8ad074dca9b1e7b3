//! Counterparty side of the signing protocol.
//!
//! Each party runs one [`Responder`] task. Sign requests arrive on a bounded
//! `mpsc` inbox, each carrying a `oneshot` for the answer. The task re-runs
//! the contract, checks the signatures already attached, applies its
//! injected [`SigningPolicy`], and replies either with its signature or an
//! explicit refusal. It never drops a request without answering.
//!
//! Parties do not share memory. The only thing that crosses the boundary is
//! the proposal itself and the reply.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::ProtocolFailure;
use super::policy::SigningPolicy;
use super::state::FlowId;
use crate::crypto::keys::{LedgerKeypair, LedgerPublicKey};
use crate::identity::Party;
use crate::transaction::{
    signature_over, verify_proposal, verify_signatures, TransactionProposal, TransactionSignature,
};

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

pub struct SignRequest {
    pub flow_id: FlowId,
    pub proposal: TransactionProposal,
    pub reply: oneshot::Sender<SignResponse>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignResponse {
    Signed(TransactionSignature),
    Refused(String),
}

// ---------------------------------------------------------------------------
// Responder
// ---------------------------------------------------------------------------

pub struct Responder {
    party: Party,
    keypair: LedgerKeypair,
    policy: Arc<dyn SigningPolicy>,
}

impl Responder {
    pub fn new(party: Party, keypair: LedgerKeypair, policy: Arc<dyn SigningPolicy>) -> Self {
        Self {
            party,
            keypair,
            policy,
        }
    }

    pub fn party(&self) -> &Party {
        &self.party
    }

    /// Decide on one proposal. Pure apart from the log lines.
    pub fn respond(&self, proposal: &TransactionProposal) -> SignResponse {
        if proposal.id != proposal.compute_id() {
            return SignResponse::Refused("proposal id does not match its contents".to_string());
        }
        if let Err(e) = verify_proposal(proposal) {
            return SignResponse::Refused(e.to_string());
        }
        if let Err(e) = verify_signatures(proposal) {
            return SignResponse::Refused(e.to_string());
        }
        // Owners move their own states by initiating, never on request.
        if let Some(input) = proposal
            .inputs
            .iter()
            .find(|i| i.record.owner.owning_key == self.party.owning_key)
        {
            return SignResponse::Refused(format!(
                "{} is mine; I only move my own states myself",
                input.state_ref
            ));
        }
        if let Err(reason) = self.policy.check(proposal, &self.party) {
            return SignResponse::Refused(reason);
        }
        SignResponse::Signed(signature_over(&proposal.id, &self.keypair))
    }

    /// Run on its own task. The task ends when every handle is dropped.
    pub fn spawn(self, inbox_capacity: usize) -> (CounterpartyHandle, JoinHandle<()>) {
        let (sender, mut inbox) = mpsc::channel::<SignRequest>(inbox_capacity.max(1));
        let handle = CounterpartyHandle::new(self.party.clone(), sender);

        let task = tokio::spawn(async move {
            while let Some(request) = inbox.recv().await {
                let response = self.respond(&request.proposal);
                match &response {
                    SignResponse::Signed(_) => {
                        info!(party = %self.party, flow = %request.flow_id, tx = %request.proposal.id, "signed")
                    }
                    SignResponse::Refused(reason) => {
                        warn!(party = %self.party, flow = %request.flow_id, %reason, "refused to sign")
                    }
                }
                if request.reply.send(response).is_err() {
                    debug!(party = %self.party, flow = %request.flow_id, "initiator went away before the reply");
                }
            }
            debug!(party = %self.party, "responder stopped");
        });

        (handle, task)
    }
}

// ---------------------------------------------------------------------------
// CounterpartyHandle
// ---------------------------------------------------------------------------

/// The initiator's way of talking to a responder task.
#[derive(Clone)]
pub struct CounterpartyHandle {
    party: Party,
    inbox: mpsc::Sender<SignRequest>,
}

impl CounterpartyHandle {
    /// Wrap an inbox. Whatever reads the other end must answer each
    /// [`SignRequest`] on its `reply` channel.
    pub fn new(party: Party, inbox: mpsc::Sender<SignRequest>) -> Self {
        Self { party, inbox }
    }

    pub fn party(&self) -> &Party {
        &self.party
    }

    pub async fn request_signature(
        &self,
        flow_id: FlowId,
        proposal: TransactionProposal,
    ) -> Result<SignResponse, ProtocolFailure> {
        let (reply, answer) = oneshot::channel();
        self.inbox
            .send(SignRequest {
                flow_id,
                proposal,
                reply,
            })
            .await
            .map_err(|_| ProtocolFailure::CounterpartyUnavailable(self.party.name.clone()))?;
        answer
            .await
            .map_err(|_| ProtocolFailure::CounterpartyUnavailable(self.party.name.clone()))
    }
}

// ---------------------------------------------------------------------------
// PartyDirectory
// ---------------------------------------------------------------------------

/// Well-known parties and how to reach them.
#[derive(Default)]
pub struct PartyDirectory {
    by_name: DashMap<String, CounterpartyHandle>,
    by_key: DashMap<LedgerPublicKey, String>,
}

impl PartyDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a party's responder.
    pub fn register(&self, handle: CounterpartyHandle) {
        let party = handle.party().clone();
        self.by_key.insert(party.owning_key, party.name.clone());
        self.by_name.insert(party.name, handle);
    }

    pub fn by_name(&self, name: &str) -> Option<CounterpartyHandle> {
        self.by_name.get(name).map(|entry| entry.value().clone())
    }

    pub fn by_key(&self, key: &LedgerPublicKey) -> Option<CounterpartyHandle> {
        let name = self.by_key.get(key)?.value().clone();
        self.by_name(&name)
    }

    pub fn party(&self, name: &str) -> Option<Party> {
        self.by_name(name).map(|h| h.party().clone())
    }

    pub fn parties(&self) -> Vec<Party> {
        let mut parties: Vec<_> = self
            .by_name
            .iter()
            .map(|entry| entry.value().party().clone())
            .collect();
        parties.sort_by(|a, b| a.name.cmp(&b.name));
        parties
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
