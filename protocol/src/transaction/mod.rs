//! # Transaction Module
//!
//! Construction, signing and verification of ledger transaction proposals.
//!
//! ## Architecture
//!
//! ```text
//! types.rs        — Commands, time windows, attached signatures
//! builder.rs      — TransactionProposal and the fluent TransactionBuilder
//! signing.rs      — Ed25519 signing over the proposal id
//! verification.rs — The asset contract and signature checks
//! ```
//!
//! ## Lifecycle
//!
//! 1. **Build** — [`TransactionBuilder::issue`] or [`TransactionBuilder::transfer`].
//! 2. **Verify** — [`verify_proposal`] before anyone signs.
//! 3. **Sign** — [`sign_proposal`] by the initiator, then by counterparties
//!    through the flow layer.
//! 4. **Commit** — handed to the notary; see [`crate::notary`].
//!
//! ## Design Decisions
//!
//! - Proposal ids are `double_sha256` of the canonical byte representation
//!   (excluding signatures), so every signer signs the same 32 bytes.
//! - The command set is a closed enum. The verifier matches on it
//!   exhaustively.

pub mod builder;
pub mod signing;
pub mod types;
pub mod verification;

pub use builder::{TransactionBuilder, TransactionProposal};
pub use signing::{sign_proposal, signature_over};
pub use types::{Command, CommandKind, TimeWindow, TransactionSignature};
pub use verification::{
    group_by_lineage, missing_signatures, verify, verify_proposal, verify_signatures,
    VerificationFailure,
};
