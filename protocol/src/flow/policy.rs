//! Counterparty signing policies.
//!
//! The contract says whether a proposal is *valid*. A policy says whether
//! this particular counterparty is *willing* to sign it. Policies are
//! injected per responder, so a deployment can change who it trusts without
//! touching the protocol.
//!
//! [`WhitelistPolicy`] reproduces the issuer whitelist checks:
//!
//! 1. the proposal carries exactly one output;
//! 2. on issuance, the responder itself is a whitelisted issuer;
//! 3. the output's issuer is whitelisted;
//! 4. the output's issuer is the responder.

use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::identity::Party;
use crate::transaction::{CommandKind, TransactionProposal};

// ---------------------------------------------------------------------------
// SigningPolicy
// ---------------------------------------------------------------------------

/// A counterparty's domain checks. `Err` carries the refusal reason sent
/// back to the initiator.
pub trait SigningPolicy: Send + Sync {
    fn check(&self, proposal: &TransactionProposal, me: &Party) -> Result<(), String>;
}

impl<F> SigningPolicy for F
where
    F: Fn(&TransactionProposal, &Party) -> Result<(), String> + Send + Sync,
{
    fn check(&self, proposal: &TransactionProposal, me: &Party) -> Result<(), String> {
        self(proposal, me)
    }
}

/// Signs anything the contract accepts.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl SigningPolicy for AcceptAll {
    fn check(&self, _proposal: &TransactionProposal, _me: &Party) -> Result<(), String> {
        Ok(())
    }
}

/// All member policies must pass; the first refusal wins.
#[derive(Default, Clone)]
pub struct PolicySet {
    policies: Vec<Arc<dyn SigningPolicy>>,
}

impl PolicySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, policy: Arc<dyn SigningPolicy>) -> Self {
        self.policies.push(policy);
        self
    }
}

impl SigningPolicy for PolicySet {
    fn check(&self, proposal: &TransactionProposal, me: &Party) -> Result<(), String> {
        self.policies.iter().try_for_each(|p| p.check(proposal, me))
    }
}

// ---------------------------------------------------------------------------
// Issuer registry
// ---------------------------------------------------------------------------

/// Source of truth for who may issue. Consulted on every check.
pub trait IssuerRegistry: Send + Sync {
    fn is_authorized_issuer(&self, party: &Party) -> bool;
}

/// Issuers recognised by well-known name. The set can be replaced while the
/// network runs; the next check sees the new set.
#[derive(Debug, Default)]
pub struct StaticIssuerRegistry {
    names: RwLock<BTreeSet<String>>,
}

impl StaticIssuerRegistry {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: RwLock::new(names.into_iter().map(Into::into).collect()),
        }
    }

    pub fn replace<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.names.write() = names.into_iter().map(Into::into).collect();
    }

    pub fn insert(&self, name: impl Into<String>) {
        self.names.write().insert(name.into());
    }

    pub fn remove(&self, name: &str) -> bool {
        self.names.write().remove(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.names.read().iter().cloned().collect()
    }
}

impl IssuerRegistry for StaticIssuerRegistry {
    fn is_authorized_issuer(&self, party: &Party) -> bool {
        self.names.read().contains(&party.name)
    }
}

// ---------------------------------------------------------------------------
// WhitelistPolicy
// ---------------------------------------------------------------------------

pub struct WhitelistPolicy {
    registry: Arc<dyn IssuerRegistry>,
}

impl WhitelistPolicy {
    pub fn new(registry: Arc<dyn IssuerRegistry>) -> Self {
        Self { registry }
    }
}

impl SigningPolicy for WhitelistPolicy {
    fn check(&self, proposal: &TransactionProposal, me: &Party) -> Result<(), String> {
        let [output] = proposal.outputs.as_slice() else {
            return Err("This must be an asset transaction".to_string());
        };

        let is_issue = proposal
            .command()
            .is_some_and(|c| c.kind == CommandKind::Issue);
        if is_issue && !self.registry.is_authorized_issuer(me) {
            return Err("I must be a whitelisted node".to_string());
        }
        if !self.registry.is_authorized_issuer(&output.issuer) {
            return Err("The asset must be issued by a whitelisted node".to_string());
        }
        if output.issuer.owning_key != me.owning_key {
            return Err("The issuer of an asset must be the issuing node".to_string());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AssetRecord, StateAndRecord, StateRef};
    use crate::crypto::hash::TxHash;
    use crate::crypto::keys::LedgerKeypair;
    use crate::transaction::TransactionBuilder;

    fn party(name: &str) -> Party {
        Party::from_keypair(name, &LedgerKeypair::generate())
    }

    fn whitelist(names: &[&str]) -> (Arc<StaticIssuerRegistry>, WhitelistPolicy) {
        let registry = Arc::new(StaticIssuerRegistry::new(names.iter().copied()));
        let policy = WhitelistPolicy::new(registry.clone());
        (registry, policy)
    }

    #[test]
    fn whitelisted_issuer_signs_own_issuance() {
        let (bank, corp, notary) = (party("Bank"), party("Corp"), party("Notary"));
        let (_, policy) = whitelist(&["Bank"]);
        let p = TransactionBuilder::issue("t", bank.clone(), corp, notary).build();
        assert_eq!(policy.check(&p, &bank), Ok(()));
    }

    #[test]
    fn non_whitelisted_responder_refuses_issuance() {
        let (rogue, corp, notary) = (party("Rogue"), party("Corp"), party("Notary"));
        let (_, policy) = whitelist(&["Bank"]);
        let p = TransactionBuilder::issue("t", rogue.clone(), corp, notary).build();
        assert_eq!(
            policy.check(&p, &rogue),
            Err("I must be a whitelisted node".to_string())
        );
    }

    #[test]
    fn responder_must_be_the_issuer() {
        let (bank, other_bank, corp, notary) =
            (party("Bank"), party("OtherBank"), party("Corp"), party("Notary"));
        let (_, policy) = whitelist(&["Bank", "OtherBank"]);
        let p = TransactionBuilder::issue("t", bank, corp, notary).build();
        assert_eq!(
            policy.check(&p, &other_bank),
            Err("The issuer of an asset must be the issuing node".to_string())
        );
    }

    #[test]
    fn move_back_to_issuer_is_accepted_without_self_whitelist_check() {
        let (bank, corp, notary) = (party("Bank"), party("Corp"), party("Notary"));
        let (registry, policy) = whitelist(&["Bank"]);
        let held = StateAndRecord::new(
            StateRef::new(TxHash::of(b"issue"), 0),
            AssetRecord::new("t", bank.clone(), corp),
        );
        let p = TransactionBuilder::transfer(&held, bank.clone(), notary).build();
        assert_eq!(policy.check(&p, &bank), Ok(()));

        // De-listing the issuer takes effect on the next check.
        registry.remove("Bank");
        assert_eq!(
            policy.check(&p, &bank),
            Err("The asset must be issued by a whitelisted node".to_string())
        );
    }

    #[test]
    fn registry_is_re_resolved() {
        let (rogue, corp, notary) = (party("Rogue"), party("Corp"), party("Notary"));
        let (registry, policy) = whitelist(&[]);
        let p = TransactionBuilder::issue("t", rogue.clone(), corp, notary).build();
        assert!(policy.check(&p, &rogue).is_err());
        registry.replace(["Rogue"]);
        assert_eq!(policy.check(&p, &rogue), Ok(()));
        assert_eq!(registry.names(), vec!["Rogue".to_string()]);
    }

    #[test]
    fn closures_and_policy_sets() {
        let (bank, notary) = (party("Bank"), party("Notary"));
        let p = TransactionBuilder::issue("t", bank.clone(), bank.clone(), notary).build();

        let no_secrets = |p: &TransactionProposal, _: &Party| {
            if p.outputs.iter().any(|o| o.content.contains("secret")) {
                Err("no secrets".to_string())
            } else {
                Ok(())
            }
        };
        let set = PolicySet::new()
            .with(Arc::new(AcceptAll))
            .with(Arc::new(no_secrets));
        assert_eq!(set.check(&p, &bank), Ok(()));

        let refuse = PolicySet::new().with(Arc::new(|_: &TransactionProposal, _: &Party| {
            Err::<(), _>("never".to_string())
        }));
        assert_eq!(refuse.check(&p, &bank), Err("never".to_string()));
    }

    #[test]
    fn multi_output_is_not_an_asset_transaction() {
        let (bank, notary) = (party("Bank"), party("Notary"));
        let (_, policy) = whitelist(&["Bank"]);
        let p = TransactionBuilder::new(notary)
            .output(AssetRecord::new("a", bank.clone(), bank.clone()))
            .output(AssetRecord::new("b", bank.clone(), bank.clone()))
            .build();
        assert_eq!(
            policy.check(&p, &bank),
            Err("This must be an asset transaction".to_string())
        );
    }
}
