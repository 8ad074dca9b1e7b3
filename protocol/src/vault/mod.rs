//! # Vault
//!
//! A party's view of the ledger: the records it currently holds, and a feed
//! of newly committed ones.
//!
//! The vault is an observer of the committer. It never decides anything. It
//! removes consumed states, adds created ones, and pushes one [`Committed`]
//! event per created state onto a broadcast channel. Subscribers filter that
//! channel by owner.
//!
//! A vault built with [`Vault::tracking`] only keeps states its party has a
//! stake in (as issuer or owner), the way each node in a permissioned
//! network only stores what concerns it. [`Vault::new`] keeps everything.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream, StreamExt};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::asset::{AssetRecord, StateAndRecord, StateRef};
use crate::config::VAULT_EVENT_CAPACITY;
use crate::crypto::hash::TxHash;
use crate::identity::Party;
use crate::notary::{CommittedTransaction, VaultObserver};

/// A newly committed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Committed {
    pub tx_hash: TxHash,
    pub state: StateAndRecord,
    pub committed_at: DateTime<Utc>,
}

pub struct Vault {
    relevant_to: Option<Party>,
    states: RwLock<BTreeMap<StateRef, AssetRecord>>,
    events: broadcast::Sender<Committed>,
}

impl Default for Vault {
    fn default() -> Self {
        Self::new()
    }
}

impl Vault {
    /// A vault that records every committed state.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(VAULT_EVENT_CAPACITY);
        Self {
            relevant_to: None,
            states: RwLock::new(BTreeMap::new()),
            events,
        }
    }

    /// A vault that only records states `party` participates in.
    pub fn tracking(party: Party) -> Self {
        Self {
            relevant_to: Some(party),
            ..Self::new()
        }
    }

    fn is_relevant(&self, record: &AssetRecord) -> bool {
        match &self.relevant_to {
            None => true,
            Some(me) => record.participants().contains(&me),
        }
    }

    /// Snapshot of unconsumed records owned by `owner`, in ref order.
    pub fn query_owned(&self, owner: &Party) -> Vec<StateAndRecord> {
        self.states
            .read()
            .iter()
            .filter(|(_, record)| &record.owner == owner)
            .map(|(state_ref, record)| StateAndRecord::new(*state_ref, record.clone()))
            .collect()
    }

    /// Unconsumed record at `state_ref`, if this vault holds it.
    pub fn get(&self, state_ref: &StateRef) -> Option<StateAndRecord> {
        self.states
            .read()
            .get(state_ref)
            .map(|record| StateAndRecord::new(*state_ref, record.clone()))
    }

    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }

    /// Live feed of records committed to `owner` from now on.
    ///
    /// Drop the stream to unsubscribe. A subscriber that falls more than
    /// `VAULT_EVENT_CAPACITY` events behind loses the oldest ones.
    pub fn subscribe(&self, owner: &Party) -> impl Stream<Item = Committed> + Send + 'static {
        let owner = owner.clone();
        let receiver = self.events.subscribe();

        stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => return Some((event, receiver)),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "vault subscriber lagged; events dropped");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        })
        .filter(move |event| {
            let wanted = event.state.record.owner == owner;
            futures::future::ready(wanted)
        })
    }

    fn apply(&self, tx: &CommittedTransaction) -> Vec<Committed> {
        let mut states = self.states.write();
        for consumed in tx.consumed() {
            states.remove(&consumed);
        }

        let mut events = Vec::new();
        for created in tx.outputs() {
            if !self.is_relevant(&created.record) {
                continue;
            }
            states.insert(created.state_ref, created.record.clone());
            events.push(Committed {
                tx_hash: tx.tx_hash,
                state: created,
                committed_at: tx.committed_at,
            });
        }
        events
    }
}

#[async_trait]
impl VaultObserver for Vault {
    async fn on_committed(&self, tx: &CommittedTransaction) {
        let events = self.apply(tx);
        debug!(tx = %tx.tx_hash, created = events.len(), "vault updated");
        for event in events {
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
