//! # Identity Module
//!
//! Every participant on the ledger, notary included, is a [`Party`]: a
//! well-known name plus the Ed25519 key it signs with. Parties are resolved
//! by name through the flow layer's directory, the same way a permissioned
//! network resolves its well-known members.

pub mod party;

pub use party::Party;
