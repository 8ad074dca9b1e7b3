//! # Notary
//!
//! The last hop of every transaction. The [`LedgerCommitter`] submits a
//! fully signed proposal to a [`Sequencer`], the trusted authority that
//! retires inputs and creates outputs atomically, and then announces the
//! result to vault observers.
//!
//! The sequencer is a black box to the rest of the crate. The in-memory
//! implementation here is a validating notary: it re-runs the contract,
//! checks signatures and the time window, and arbitrates double spends
//! under a single lock.

pub mod committer;
pub mod error;
pub mod sequencer;

pub use committer::{CommittedTransaction, LedgerCommitter, VaultObserver};
pub use error::CommitFailure;
pub use sequencer::{InMemorySequencer, NotarisationReceipt, NotarisationRequest, Sequencer};
