//! Initiator side of the signing protocol.
//!
//! The [`SigningCoordinator`] takes a freshly built proposal and drives it
//! through [`FlowStateMachine`]:
//!
//! 1. verify locally, sign with the initiator's key (`LocallySigned`);
//! 2. send the proposal to every required signer that has not signed, plus
//!    any approvers the caller named (`AwaitingCounterparty`);
//! 3. consume answers in whatever order they arrive, verifying and
//!    accumulating each signature; stop at the first refusal;
//! 4. once nothing is missing (`FullySigned`), hand off to the
//!    [`LedgerCommitter`] (`Committed`).
//!
//! The whole wait in step 3 is bounded by the configured counterparty
//! timeout. Dropping the future returned by [`SigningCoordinator::run`]
//! abandons the flow: the tracker records it as rejected with
//! [`ABANDONED`], and nothing reaches the ledger unless step 4 completed.

use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::error::{FlowError, ProtocolFailure};
use super::responder::{CounterpartyHandle, PartyDirectory, SignResponse};
use super::state::{FlowId, FlowStateMachine, FlowTracker};
use crate::config::LedgerConfig;
use crate::crypto::keys::{LedgerKeypair, LedgerPublicKey};
use crate::identity::Party;
use crate::notary::{CommittedTransaction, LedgerCommitter};
use crate::transaction::{missing_signatures, sign_proposal, verify_proposal, TransactionProposal};

/// Reason recorded for a flow whose future was dropped before it finished.
pub const ABANDONED: &str = "abandoned";

pub struct SigningCoordinator {
    me: Party,
    keypair: LedgerKeypair,
    directory: Arc<PartyDirectory>,
    committer: Arc<LedgerCommitter>,
    tracker: Arc<FlowTracker>,
    config: LedgerConfig,
}

impl SigningCoordinator {
    pub fn new(
        me: Party,
        keypair: LedgerKeypair,
        directory: Arc<PartyDirectory>,
        committer: Arc<LedgerCommitter>,
        config: LedgerConfig,
    ) -> Self {
        Self {
            me,
            keypair,
            directory,
            committer,
            tracker: Arc::new(FlowTracker::with_retention(config.flow_retention)),
            config,
        }
    }

    pub fn party(&self) -> &Party {
        &self.me
    }

    pub fn tracker(&self) -> &Arc<FlowTracker> {
        &self.tracker
    }

    /// Collect every signature and commit.
    ///
    /// `approvers` are parties whose consent is needed even though the
    /// contract does not require their signature (the receiving side of a
    /// transfer).
    pub async fn run(
        &self,
        proposal: TransactionProposal,
        approvers: &[Party],
    ) -> Result<CommittedTransaction, FlowError> {
        let mut flow = self.start(&proposal);
        let result = async {
            let signed = self.collect(&mut flow.machine, proposal, approvers).await?;

            // FullySigned → Committed
            let committed = self.committer.commit(&signed).await?;
            flow.machine.mark_committed(committed.tx_hash);
            self.tracker.observe(&flow.machine);
            info!(
                flow = %flow.machine.id(),
                tx = %committed.tx_hash,
                elapsed_ms = flow.machine.elapsed_ms(),
                "flow committed"
            );
            Ok::<_, FlowError>(committed)
        }
        .await;
        self.finish(&mut flow.machine, result)
    }

    fn start(&self, proposal: &TransactionProposal) -> FlowGuard<'_> {
        let machine = FlowStateMachine::new(FlowId::new(), proposal.id);
        self.tracker.observe(&machine);
        FlowGuard {
            machine,
            tracker: self.tracker.as_ref(),
        }
    }

    fn finish<T>(
        &self,
        machine: &mut FlowStateMachine,
        result: Result<T, FlowError>,
    ) -> Result<T, FlowError> {
        if let Err(e) = &result {
            warn!(flow = %machine.id(), tx = %machine.tx_id(), error = %e, "flow rejected");
            machine.mark_rejected(e.to_string());
            self.tracker.observe(machine);
        }
        result
    }

    /// Built → LocallySigned → AwaitingCounterparty → FullySigned.
    async fn collect(
        &self,
        machine: &mut FlowStateMachine,
        mut proposal: TransactionProposal,
        approvers: &[Party],
    ) -> Result<TransactionProposal, FlowError> {
        verify_proposal(&proposal)?;
        sign_proposal(&mut proposal, &self.keypair);
        machine.mark_locally_signed();
        self.tracker.observe(machine);

        let counterparties = self.counterparties(&proposal, approvers)?;
        machine.mark_awaiting_counterparty();
        self.tracker.observe(machine);
        info!(
            flow = %machine.id(),
            tx = %proposal.id,
            counterparties = counterparties.len(),
            "collecting signatures"
        );

        let timeout = self.config.counterparty_timeout();
        let proposal = tokio::time::timeout(timeout, self.gather(machine.id(), proposal, counterparties))
            .await
            .map_err(|_| ProtocolFailure::Timeout {
                waited_ms: timeout.as_millis() as u64,
            })??;

        let missing = missing_signatures(&proposal);
        if !missing.is_empty() {
            return Err(ProtocolFailure::MissingSignatures(
                missing.iter().map(|k| k.to_hex()).collect(),
            )
            .into());
        }
        machine.mark_fully_signed();
        self.tracker.observe(machine);
        Ok(proposal)
    }

    /// Everyone who must see the proposal: unsigned required signers, then
    /// approvers. Never the initiator; each party once.
    fn counterparties(
        &self,
        proposal: &TransactionProposal,
        approvers: &[Party],
    ) -> Result<Vec<CounterpartyHandle>, ProtocolFailure> {
        let mut seen: BTreeSet<LedgerPublicKey> = BTreeSet::from([self.me.owning_key]);
        let mut handles = Vec::new();

        for key in missing_signatures(proposal) {
            if !seen.insert(key) {
                continue;
            }
            let handle = self
                .directory
                .by_key(&key)
                .ok_or_else(|| ProtocolFailure::UnknownCounterparty(key.to_hex()))?;
            handles.push(handle);
        }

        for approver in approvers {
            if !seen.insert(approver.owning_key) {
                continue;
            }
            let handle = self
                .directory
                .by_key(&approver.owning_key)
                .ok_or_else(|| ProtocolFailure::UnknownCounterparty(approver.name.clone()))?;
            handles.push(handle);
        }

        Ok(handles)
    }

    async fn gather(
        &self,
        flow_id: FlowId,
        mut proposal: TransactionProposal,
        counterparties: Vec<CounterpartyHandle>,
    ) -> Result<TransactionProposal, FlowError> {
        let mut pending: FuturesUnordered<_> = counterparties
            .into_iter()
            .map(|counterparty| {
                let snapshot = proposal.clone();
                async move {
                    let response = counterparty.request_signature(flow_id, snapshot).await;
                    (counterparty.party().clone(), response)
                }
            })
            .collect();

        while let Some((party, response)) = pending.next().await {
            match response? {
                SignResponse::Signed(signature) => {
                    if signature.by != party.owning_key
                        || !signature.by.verify(proposal.id.as_bytes(), &signature.signature)
                    {
                        return Err(ProtocolFailure::InvalidCounterpartySignature(party.name).into());
                    }
                    debug!(flow = %flow_id, party = %party, "signature received");
                    proposal.add_signature(signature);
                }
                SignResponse::Refused(reason) => {
                    return Err(ProtocolFailure::CounterpartyRefused {
                        party: party.name,
                        reason,
                    }
                    .into());
                }
            }
        }

        Ok(proposal)
    }
}

/// A started flow. Dropped before a terminal state, it is recorded as
/// rejected so the tracker never holds it in flight.
struct FlowGuard<'a> {
    machine: FlowStateMachine,
    tracker: &'a FlowTracker,
}

impl Drop for FlowGuard<'_> {
    fn drop(&mut self) {
        if self.machine.is_terminal() {
            return;
        }
        warn!(
            flow = %self.machine.id(),
            tx = %self.machine.tx_id(),
            state = %self.machine.state(),
            "flow abandoned"
        );
        self.machine.mark_rejected(ABANDONED);
        self.tracker.observe(&self.machine);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
