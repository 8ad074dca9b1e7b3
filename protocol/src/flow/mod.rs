//! # Signing Flows
//!
//! The two-phase protocol that takes a proposal from "built" to
//! "committed": collect every required signature, then finalise through the
//! notary.
//!
//! ## Architecture
//!
//! ```text
//! state.rs       — FlowStateMachine, FlowTracker, FlowId
//! coordinator.rs — SigningCoordinator (initiator side)
//! responder.rs   — Responder tasks, CounterpartyHandle, PartyDirectory
//! policy.rs      — SigningPolicy, IssuerRegistry, WhitelistPolicy
//! error.rs       — ProtocolFailure, FlowError
//! ```
//!
//! ## Design Decisions
//!
//! - Every party, including the initiator's counterparties, runs in its own
//!   task and talks only through channels. No locks are shared across
//!   parties.
//! - A counterparty re-runs the full contract. It never trusts the
//!   initiator's verification.
//! - Refusals are explicit messages. Silence means the counterparty is gone
//!   and surfaces as `CounterpartyUnavailable` or `Timeout`.

pub mod coordinator;
pub mod error;
pub mod policy;
pub mod responder;
pub mod state;

pub use coordinator::{SigningCoordinator, ABANDONED};
pub use error::{FlowError, ProtocolFailure};
pub use policy::{
    AcceptAll, IssuerRegistry, PolicySet, SigningPolicy, StaticIssuerRegistry, WhitelistPolicy,
};
pub use responder::{CounterpartyHandle, PartyDirectory, Responder, SignRequest, SignResponse};
pub use state::{FlowId, FlowState, FlowStateMachine, FlowTracker};
