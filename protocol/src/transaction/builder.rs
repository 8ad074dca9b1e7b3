//! Proposal construction via the builder pattern.
//!
//! The [`TransactionBuilder`] assembles an unsigned [`TransactionProposal`]
//! with a deterministic id derived from its contents. Two shortcuts cover
//! everything the asset contract accepts, [`TransactionBuilder::issue`] and
//! [`TransactionBuilder::transfer`]; the fluent setters exist for callers
//! (and tests) that need to put together something unusual.
//!
//! The builder does not sign and does not verify. Signing happens in
//! [`super::signing`], verification in [`super::verification`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use super::types::{Command, CommandKind, TimeWindow, TransactionSignature};
use crate::asset::record::{write_party, write_str};
use crate::asset::{AssetRecord, StateAndRecord, StateRef};
use crate::config::{DEFAULT_TIME_WINDOW, PROTOCOL_VERSION};
use crate::crypto::hash::TxHash;
use crate::crypto::keys::LedgerPublicKey;
use crate::identity::Party;

// ---------------------------------------------------------------------------
// TransactionProposal
// ---------------------------------------------------------------------------

/// A candidate ledger transaction.
///
/// Created by the builder, then only ever changed by appending signatures.
/// Once the notary commits it, the proposal is frozen inside a
/// [`CommittedTransaction`](crate::notary::CommittedTransaction). All outputs
/// are created or none are.
///
/// The `id` is the double-SHA-256 of [`TransactionProposal::signable_bytes`],
/// which covers everything except `signatures`. It is stable across signing
/// and becomes the committed transaction hash.
///
/// Inputs are carried resolved (reference plus record) so that every
/// participant can run the contract without access to the ledger. The
/// sequencer checks the carried records against what it actually committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionProposal {
    pub id: TxHash,
    pub version: u16,
    pub notary: Party,
    pub inputs: Vec<StateAndRecord>,
    pub outputs: Vec<AssetRecord>,
    pub commands: Vec<Command>,
    pub time_window: Option<TimeWindow>,
    pub signatures: Vec<TransactionSignature>,
}

impl TransactionProposal {
    /// Canonical byte representation used for the id and for signing.
    ///
    /// Deterministic concatenation of length-prefixed strings and
    /// fixed-width little-endian integers. Signer sets are `BTreeSet`s, so
    /// their order is fixed too.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(512);

        buf.extend_from_slice(&self.version.to_le_bytes());
        write_party(&self.notary, &mut buf);

        buf.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            buf.extend_from_slice(input.state_ref.tx_hash.as_bytes());
            buf.extend_from_slice(&input.state_ref.output_index.to_le_bytes());
            input.record.write_canonical(&mut buf);
        }

        buf.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            output.write_canonical(&mut buf);
        }

        buf.extend_from_slice(&(self.commands.len() as u32).to_le_bytes());
        for command in &self.commands {
            write_str(&command.kind.to_string(), &mut buf);
            buf.extend_from_slice(&(command.signers.len() as u32).to_le_bytes());
            for signer in &command.signers {
                buf.extend_from_slice(signer.as_bytes());
            }
        }

        match &self.time_window {
            Some(window) => {
                buf.push(0x01);
                window.write_canonical(&mut buf);
            }
            None => buf.push(0x00),
        }

        buf
    }

    /// `double_sha256(signable_bytes)`.
    pub fn compute_id(&self) -> TxHash {
        TxHash::of(&self.signable_bytes())
    }

    /// Union of all command signer sets.
    pub fn required_signers(&self) -> BTreeSet<LedgerPublicKey> {
        self.commands
            .iter()
            .flat_map(|c| c.signers.iter().copied())
            .collect()
    }

    /// Keys that have already signed.
    pub fn signed_by(&self) -> BTreeSet<LedgerPublicKey> {
        self.signatures.iter().map(|s| s.by).collect()
    }

    pub fn is_signed_by(&self, key: &LedgerPublicKey) -> bool {
        self.signatures.iter().any(|s| &s.by == key)
    }

    /// Append a signature. A second signature from the same key is ignored;
    /// returns whether anything was added.
    pub fn add_signature(&mut self, signature: TransactionSignature) -> bool {
        if self.is_signed_by(&signature.by) {
            return false;
        }
        self.signatures.push(signature);
        true
    }

    pub fn input_refs(&self) -> Vec<StateRef> {
        self.inputs.iter().map(|i| i.state_ref).collect()
    }

    /// The single command, if there is exactly one.
    pub fn command(&self) -> Option<&Command> {
        match self.commands.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// `StateRef` each output will occupy once committed.
    pub fn output_refs(&self) -> impl Iterator<Item = StateRef> + '_ {
        (0..self.outputs.len() as u32).map(move |i| StateRef::new(self.id, i))
    }
}

// ---------------------------------------------------------------------------
// TransactionBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for unsigned [`TransactionProposal`]s.
///
/// # Usage
///
/// ```rust,no_run
/// use asset_ledger::{LedgerKeypair, Party, TransactionBuilder};
///
/// let issuer = Party::from_keypair("Issuer", &LedgerKeypair::generate());
/// let owner = Party::from_keypair("PartyA", &LedgerKeypair::generate());
/// let notary = Party::from_keypair("Notary", &LedgerKeypair::generate());
///
/// let proposal = TransactionBuilder::issue("hello", issuer, owner, notary).build();
/// assert_eq!(proposal.outputs.len(), 1);
/// ```
///
/// Unless an explicit window is set, `build()` attaches
/// `[now, now + window_duration)`, ten seconds by default.
pub struct TransactionBuilder {
    notary: Party,
    inputs: Vec<StateAndRecord>,
    outputs: Vec<AssetRecord>,
    commands: Vec<Command>,
    time_window: Option<TimeWindow>,
    window_duration: Option<Duration>,
    now: Option<DateTime<Utc>>,
}

impl TransactionBuilder {
    /// Empty proposal for `notary`, with no time window.
    pub fn new(notary: Party) -> Self {
        Self {
            notary,
            inputs: Vec::new(),
            outputs: Vec::new(),
            commands: Vec::new(),
            time_window: None,
            window_duration: None,
            now: None,
        }
    }

    /// Issue `content` as a new record. The issuer must sign.
    pub fn issue(content: impl Into<String>, issuer: Party, owner: Party, notary: Party) -> Self {
        let signer = issuer.owning_key;
        Self::new(notary)
            .output(AssetRecord::new(content, issuer, owner))
            .command(Command::new(CommandKind::Issue, [signer]))
            .window_duration(DEFAULT_TIME_WINDOW)
    }

    /// Move `existing` to `new_owner`. The current owner must sign.
    pub fn transfer(existing: &StateAndRecord, new_owner: Party, notary: Party) -> Self {
        let signer = existing.record.owner.owning_key;
        Self::new(notary)
            .input(existing.clone())
            .output(existing.record.with_owner(new_owner))
            .command(Command::new(CommandKind::Move, [signer]))
            .window_duration(DEFAULT_TIME_WINDOW)
    }

    pub fn input(mut self, input: StateAndRecord) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn output(mut self, output: AssetRecord) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    /// Explicit window. Takes precedence over `window_duration`.
    pub fn time_window(mut self, window: TimeWindow) -> Self {
        self.time_window = Some(window);
        self
    }

    /// Drop any window, explicit or derived.
    pub fn no_time_window(mut self) -> Self {
        self.time_window = None;
        self.window_duration = None;
        self
    }

    pub fn window_duration(mut self, duration: Duration) -> Self {
        self.window_duration = Some(duration);
        self
    }

    /// Override the clock used to anchor a derived window.
    pub fn now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// Consume the builder and produce an unsigned proposal with its id set.
    pub fn build(self) -> TransactionProposal {
        let time_window = self.time_window.or_else(|| {
            self.window_duration.map(|duration| {
                TimeWindow::starting_at(self.now.unwrap_or_else(Utc::now), duration)
            })
        });

        let mut proposal = TransactionProposal {
            id: TxHash::from_bytes([0u8; 32]),
            version: PROTOCOL_VERSION,
            notary: self.notary,
            inputs: self.inputs,
            outputs: self.outputs,
            commands: self.commands,
            time_window,
            signatures: Vec::new(),
        };
        proposal.id = proposal.compute_id();
        proposal
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
