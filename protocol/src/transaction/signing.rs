//! Proposal signing with Ed25519 keypairs.
//!
//! Every signer signs the same 32 bytes: the proposal id. Because the id is
//! the hash of the canonical signable bytes, a signature over the id commits
//! the signer to every input, output, command and the time window.

use super::builder::TransactionProposal;
use super::types::TransactionSignature;
use crate::crypto::hash::TxHash;
use crate::crypto::keys::LedgerKeypair;
use crate::crypto::signatures::sign;

/// Produce `keypair`'s signature over `id` without touching any proposal.
/// Responders use this to answer a sign request.
pub fn signature_over(id: &TxHash, keypair: &LedgerKeypair) -> TransactionSignature {
    TransactionSignature {
        by: keypair.public_key(),
        signature: sign(keypair, id.as_bytes()),
    }
}

/// Sign `proposal` in place. Signing twice with the same key leaves a single
/// signature; returns whether a new one was appended.
///
/// The id is recomputed first so a proposal whose content was edited after
/// `build()` is signed under its real id, never a stale one.
pub fn sign_proposal(proposal: &mut TransactionProposal, keypair: &LedgerKeypair) -> bool {
    proposal.id = proposal.compute_id();
    let signature = signature_over(&proposal.id, keypair);
    proposal.add_signature(signature)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
