//! # Participants
//!
//! A [`Participant`] is one party's node: its key, its responder task, its
//! vault, and a coordinator for the flows it starts. The two operations an
//! outside caller needs live here:
//!
//! - [`Participant::request_issuance`]: ask an issuer to issue a thought to
//!   us. We build and sign the proposal, the issuer co-signs.
//! - [`Participant::request_transfer`]: hand something we own to someone
//!   else. We sign as owner, the new owner approves.
//!
//! [`LocalNetwork`] wires several participants to one notary inside a single
//! process. Tests and the simulation binary use it.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::asset::StateAndRecord;
use crate::config::LedgerConfig;
use crate::crypto::keys::LedgerKeypair;
use crate::flow::{
    FlowError, FlowTracker, PartyDirectory, ProtocolFailure, Responder, SigningCoordinator,
    SigningPolicy,
};
use crate::identity::Party;
use crate::notary::{CommittedTransaction, InMemorySequencer, LedgerCommitter, Sequencer};
use crate::transaction::TransactionBuilder;
use crate::vault::Vault;

// ---------------------------------------------------------------------------
// Participant
// ---------------------------------------------------------------------------

pub struct Participant {
    party: Party,
    notary: Party,
    config: LedgerConfig,
    coordinator: SigningCoordinator,
    vault: Arc<Vault>,
    directory: Arc<PartyDirectory>,
    responder_task: JoinHandle<()>,
}

impl Participant {
    pub fn party(&self) -> &Party {
        &self.party
    }

    pub fn vault(&self) -> &Arc<Vault> {
        &self.vault
    }

    pub fn flows(&self) -> &Arc<FlowTracker> {
        self.coordinator.tracker()
    }

    /// Records this participant currently owns.
    pub fn holdings(&self) -> Vec<StateAndRecord> {
        self.vault.query_owned(&self.party)
    }

    /// Ask `issuer` to issue `content` with us as the owner.
    pub async fn request_issuance(
        &self,
        content: impl Into<String>,
        issuer: &Party,
    ) -> Result<CommittedTransaction, FlowError> {
        let proposal = TransactionBuilder::issue(
            content,
            issuer.clone(),
            self.party.clone(),
            self.notary.clone(),
        )
        .window_duration(self.config.time_window())
        .build();

        info!(party = %self.party, issuer = %issuer, tx = %proposal.id, "requesting issuance");
        self.coordinator.run(proposal, &[]).await
    }

    /// Same as [`Self::request_issuance`], resolving the issuer by name.
    pub async fn request_issuance_from(
        &self,
        content: impl Into<String>,
        issuer_name: &str,
    ) -> Result<CommittedTransaction, FlowError> {
        let issuer = self.lookup(issuer_name)?;
        self.request_issuance(content, &issuer).await
    }

    /// Move `state` to `new_owner`. `new_owner` must approve.
    ///
    /// Only the current owner may start a transfer; anything else fails with
    /// [`ProtocolFailure::NotOwner`] before a proposal is built.
    pub async fn request_transfer(
        &self,
        state: &StateAndRecord,
        new_owner: &Party,
    ) -> Result<CommittedTransaction, FlowError> {
        if state.record.owner.owning_key != self.party.owning_key {
            warn!(
                party = %self.party,
                input = %state.state_ref,
                owner = %state.record.owner,
                "refusing to move a state we do not own"
            );
            return Err(ProtocolFailure::NotOwner {
                state_ref: state.state_ref,
                owner: state.record.owner.name.clone(),
            }
            .into());
        }

        let proposal = TransactionBuilder::transfer(state, new_owner.clone(), self.notary.clone())
            .window_duration(self.config.time_window())
            .build();

        info!(
            party = %self.party,
            new_owner = %new_owner,
            input = %state.state_ref,
            tx = %proposal.id,
            "requesting transfer"
        );
        self.coordinator
            .run(proposal, std::slice::from_ref(new_owner))
            .await
    }

    pub async fn request_transfer_to(
        &self,
        state: &StateAndRecord,
        new_owner_name: &str,
    ) -> Result<CommittedTransaction, FlowError> {
        let new_owner = self.lookup(new_owner_name)?;
        self.request_transfer(state, &new_owner).await
    }

    fn lookup(&self, name: &str) -> Result<Party, FlowError> {
        self.directory
            .party(name)
            .ok_or_else(|| ProtocolFailure::UnknownCounterparty(name.to_string()).into())
    }
}

impl Drop for Participant {
    fn drop(&mut self) {
        self.responder_task.abort();
    }
}

// ---------------------------------------------------------------------------
// LocalNetwork
// ---------------------------------------------------------------------------

/// Participants and a notary sharing one process.
pub struct LocalNetwork {
    config: LedgerConfig,
    sequencer: Arc<InMemorySequencer>,
    committer: Arc<LedgerCommitter>,
    directory: Arc<PartyDirectory>,
    participants: BTreeMap<String, Arc<Participant>>,
}

impl LocalNetwork {
    pub fn new(config: LedgerConfig, notary_name: impl Into<String>) -> Self {
        Self::with_notary_key(config, notary_name, LedgerKeypair::generate())
    }

    pub fn with_notary_key(
        config: LedgerConfig,
        notary_name: impl Into<String>,
        notary_key: LedgerKeypair,
    ) -> Self {
        let sequencer = Arc::new(InMemorySequencer::new(notary_name, notary_key));
        let committer = Arc::new(LedgerCommitter::new(sequencer.clone()));
        Self {
            config,
            sequencer,
            committer,
            directory: Arc::new(PartyDirectory::new()),
            participants: BTreeMap::new(),
        }
    }

    /// Add a party with a fresh key. Must be called inside a tokio runtime:
    /// the party's responder task is spawned here.
    pub fn add_participant(
        &mut self,
        name: impl Into<String>,
        policy: Arc<dyn SigningPolicy>,
    ) -> Arc<Participant> {
        self.add_participant_with_key(name, LedgerKeypair::generate(), policy)
    }

    pub fn add_participant_with_key(
        &mut self,
        name: impl Into<String>,
        keypair: LedgerKeypair,
        policy: Arc<dyn SigningPolicy>,
    ) -> Arc<Participant> {
        let party = Party::from_keypair(name, &keypair);

        let vault = Arc::new(Vault::tracking(party.clone()));
        self.committer.register_observer(vault.clone());

        let responder = Responder::new(party.clone(), keypair.clone(), policy);
        let (handle, responder_task) = responder.spawn(self.config.inbox_capacity);
        self.directory.register(handle);

        let coordinator = SigningCoordinator::new(
            party.clone(),
            keypair,
            self.directory.clone(),
            self.committer.clone(),
            self.config.clone(),
        );

        let participant = Arc::new(Participant {
            party: party.clone(),
            notary: self.sequencer.identity().clone(),
            config: self.config.clone(),
            coordinator,
            vault,
            directory: self.directory.clone(),
            responder_task,
        });
        info!(party = %party, address = %party.address(), "participant joined");
        self.participants.insert(party.name, participant.clone());
        participant
    }

    pub fn participant(&self, name: &str) -> Option<Arc<Participant>> {
        self.participants.get(name).cloned()
    }

    pub fn participants(&self) -> impl Iterator<Item = &Arc<Participant>> {
        self.participants.values()
    }

    pub fn notary(&self) -> Party {
        self.sequencer.identity().clone()
    }

    pub fn sequencer(&self) -> &Arc<InMemorySequencer> {
        &self.sequencer
    }

    pub fn committer(&self) -> &Arc<LedgerCommitter> {
        &self.committer
    }

    pub fn directory(&self) -> &Arc<PartyDirectory> {
        &self.directory
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
