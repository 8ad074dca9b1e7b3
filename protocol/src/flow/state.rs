//! Per-flow state machine and the tracker that exposes it.
//!
//! ```text
//! Built → LocallySigned → AwaitingCounterparty → FullySigned → Committed
//!   └──────────────┴────────────────┴─────────────────┴──→ Rejected(reason)
//! ```
//!
//! `Committed` and `Rejected` are terminal and immutable. Any other
//! transition that does not follow the arrows is ignored and logged.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;
use tracing::warn;
use uuid::Uuid;

use crate::config::FLOW_RETENTION;
use crate::crypto::hash::TxHash;

// ---------------------------------------------------------------------------
// FlowId
// ---------------------------------------------------------------------------

/// Identifies one run of the signing protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowId(Uuid);

impl FlowId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FlowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// FlowState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowState {
    Built,
    LocallySigned,
    AwaitingCounterparty,
    FullySigned,
    /// Terminal: on the ledger.
    Committed(TxHash),
    /// Terminal: abandoned with a reason.
    Rejected(String),
}

impl FlowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed(_) | Self::Rejected(_))
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Built => "Built",
            Self::LocallySigned => "LocallySigned",
            Self::AwaitingCounterparty => "AwaitingCounterparty",
            Self::FullySigned => "FullySigned",
            Self::Committed(_) => "Committed",
            Self::Rejected(_) => "Rejected",
        }
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Committed(tx) => write!(f, "Committed({})", tx),
            Self::Rejected(reason) => write!(f, "Rejected({})", reason),
            other => write!(f, "{}", other.name()),
        }
    }
}

// ---------------------------------------------------------------------------
// FlowStateMachine
// ---------------------------------------------------------------------------

/// Tracks one proposal through the signing protocol.
pub struct FlowStateMachine {
    id: FlowId,
    tx_id: TxHash,
    state: FlowState,
    started_at: Instant,
}

impl FlowStateMachine {
    pub fn new(id: FlowId, tx_id: TxHash) -> Self {
        Self {
            id,
            tx_id,
            state: FlowState::Built,
            started_at: Instant::now(),
        }
    }

    pub fn id(&self) -> FlowId {
        self.id
    }

    pub fn tx_id(&self) -> TxHash {
        self.tx_id
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    pub fn mark_locally_signed(&mut self) -> bool {
        self.advance(FlowState::Built, FlowState::LocallySigned)
    }

    pub fn mark_awaiting_counterparty(&mut self) -> bool {
        self.advance(FlowState::LocallySigned, FlowState::AwaitingCounterparty)
    }

    pub fn mark_fully_signed(&mut self) -> bool {
        self.advance(FlowState::AwaitingCounterparty, FlowState::FullySigned)
    }

    pub fn mark_committed(&mut self, tx_hash: TxHash) -> bool {
        self.advance(FlowState::FullySigned, FlowState::Committed(tx_hash))
    }

    /// Allowed from any non-terminal state.
    pub fn mark_rejected(&mut self, reason: impl Into<String>) -> bool {
        if self.state.is_terminal() {
            warn!(flow = %self.id, state = %self.state, "rejection after terminal state ignored");
            return false;
        }
        self.state = FlowState::Rejected(reason.into());
        true
    }

    fn advance(&mut self, from: FlowState, to: FlowState) -> bool {
        if self.state != from {
            warn!(
                flow = %self.id,
                state = %self.state,
                attempted = %to,
                "illegal flow transition ignored"
            );
            return false;
        }
        self.state = to;
        true
    }
}

// ---------------------------------------------------------------------------
// FlowTracker
// ---------------------------------------------------------------------------

/// Last known state of the flows a coordinator has started.
///
/// Live flows are always kept. Terminal ones are kept up to `retention`;
/// past that the oldest finished flow is forgotten.
pub struct FlowTracker {
    flows: DashMap<FlowId, FlowState>,
    finished: Mutex<VecDeque<FlowId>>,
    retention: usize,
}

impl Default for FlowTracker {
    fn default() -> Self {
        Self::with_retention(FLOW_RETENTION)
    }
}

impl FlowTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: usize) -> Self {
        Self {
            flows: DashMap::new(),
            finished: Mutex::new(VecDeque::new()),
            retention,
        }
    }

    pub fn observe(&self, machine: &FlowStateMachine) {
        let state = machine.state().clone();
        let terminal = state.is_terminal();
        let previous = self.flows.insert(machine.id(), state);
        if !terminal || previous.is_some_and(|p| p.is_terminal()) {
            return;
        }

        let mut finished = self.finished.lock();
        finished.push_back(machine.id());
        while finished.len() > self.retention {
            if let Some(oldest) = finished.pop_front() {
                self.flows.remove(&oldest);
            }
        }
    }

    pub fn state(&self, id: &FlowId) -> Option<FlowState> {
        self.flows.get(id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Flows that have not reached a terminal state.
    pub fn in_flight(&self) -> Vec<FlowId> {
        self.flows
            .iter()
            .filter(|entry| !entry.value().is_terminal())
            .map(|entry| *entry.key())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
