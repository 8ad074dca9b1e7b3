// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Asset Ledger — Core Library
//!
//! A small permissioned ledger for issuing and transferring ownership of
//! opaque asset records ("thoughts"). Nothing fancy about the payload; all
//! the interesting work is in making sure two parties who do not trust each
//! other end up agreeing on who owns what.
//!
//! ## Architecture
//!
//! A transaction travels left to right through these modules:
//!
//! - **asset** — The record model and its lineage key.
//! - **transaction** — Proposal construction, canonical bytes, signing and
//!   the contract verifier every participant re-runs.
//! - **flow** — The collect-signatures protocol: state machine, responder
//!   tasks, signing policies, coordinator.
//! - **notary** — The trusted sequencer and the committer that turns a fully
//!   signed proposal into an irrevocable ledger entry.
//! - **vault** — Read side: owned-record queries and commit subscriptions.
//! - **participant** — Wiring for one party's node, plus an in-process
//!   network used by tests and the simulation binary.
//! - **crypto**, **identity**, **config** — Keys, hashes, parties and the
//!   handful of constants that define the protocol.
//!
//! ## Ground Rules
//!
//! 1. Verification is pure. Same proposal, same answer, on every node.
//! 2. Nothing is persisted until the sequencer says so.
//! 3. No retries inside the core. Failures go back to whoever asked.

pub mod asset;
pub mod config;
pub mod crypto;
pub mod flow;
pub mod identity;
pub mod notary;
pub mod participant;
pub mod transaction;
pub mod vault;

pub use asset::{AssetRecord, LineageKey, StateAndRecord, StateRef};
pub use config::LedgerConfig;
pub use crypto::{LedgerKeypair, LedgerPublicKey, LedgerSignature, TxHash};
pub use flow::{FlowError, FlowId, FlowState, ProtocolFailure};
pub use identity::Party;
pub use notary::{CommitFailure, CommittedTransaction, InMemorySequencer, LedgerCommitter};
pub use participant::{LocalNetwork, Participant};
pub use transaction::{
    CommandKind, TransactionBuilder, TransactionProposal, VerificationFailure,
};
pub use vault::{Committed, Vault};
