//! # Asset Model
//!
//! The only kind of state this ledger knows: an [`AssetRecord`] carrying an
//! opaque thought, who issued it and who holds it now. Records are grouped
//! for contract checks by [`LineageKey`], an explicit `(content, issuer)`
//! pair, so a transfer is recognised as "the same asset, new owner".

pub mod record;
pub mod reference;

pub use record::{AssetRecord, LineageKey};
pub use reference::{StateAndRecord, StateRef};
