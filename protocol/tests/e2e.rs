//! End-to-end tests for the asset ledger.
//!
//! Each test builds its own in-process network: one notary, a handful of
//! participants with their own responder tasks and vaults. Nothing is shared
//! between tests.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;

use asset_ledger::flow::{
    AcceptAll, FlowError, ProtocolFailure, SigningCoordinator, SigningPolicy,
    StaticIssuerRegistry, WhitelistPolicy,
};
use asset_ledger::notary::CommitFailure;
use asset_ledger::transaction::{
    sign_proposal, verify, verify_proposal, Command, CommandKind, TransactionBuilder,
    TransactionProposal, VerificationFailure,
};
use asset_ledger::{
    AssetRecord, LedgerConfig, LedgerKeypair, LocalNetwork, Party, StateAndRecord, StateRef,
    TxHash,
};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn accept_all() -> Arc<dyn SigningPolicy> {
    Arc::new(AcceptAll)
}

fn whitelist(names: &[&str]) -> Arc<dyn SigningPolicy> {
    let registry = Arc::new(StaticIssuerRegistry::new(names.iter().copied()));
    Arc::new(WhitelistPolicy::new(registry))
}

/// Blocks the responder's worker thread. Only use on a multi-thread runtime.
fn stalling(delay: Duration) -> Arc<dyn SigningPolicy> {
    Arc::new(move |_: &TransactionProposal, _: &Party| {
        std::thread::sleep(delay);
        Ok(())
    })
}

fn network() -> LocalNetwork {
    LocalNetwork::new(LedgerConfig::default(), "Notary")
}

fn party(name: &str) -> (Party, LedgerKeypair) {
    let kp = LedgerKeypair::generate();
    (Party::from_keypair(name, &kp), kp)
}

// ---------------------------------------------------------------------------
// Issue and move
// ---------------------------------------------------------------------------

#[tokio::test]
async fn self_issuance_needs_only_the_issuer() {
    let mut net = network();
    let alice = net.add_participant("Alice", accept_all());

    let committed = alice
        .request_issuance("hello", alice.party())
        .await
        .expect("self issuance commits");

    let proposal = &committed.proposal;
    assert_eq!(
        proposal.required_signers(),
        BTreeSet::from([alice.party().owning_key])
    );
    assert!(proposal.time_window.is_some());
    assert_eq!(net.sequencer().transaction_count(), 1);

    let held = alice.holdings();
    assert_eq!(held.len(), 1);
    assert_eq!(held[0].record.content, "hello");
    assert_eq!(&held[0].record.issuer, alice.party());
    assert_eq!(&held[0].record.owner, alice.party());
}

#[tokio::test]
async fn empty_content_is_rejected_before_any_exchange() {
    let mut net = network();
    let bank = net.add_participant("Bank", accept_all());
    let corp = net.add_participant("Corp", accept_all());

    match corp.request_issuance("", bank.party()).await {
        Err(FlowError::Verification(VerificationFailure::EmptyContent)) => {}
        other => panic!("expected EmptyContent, got {:?}", other),
    }
    assert_eq!(net.sequencer().transaction_count(), 0);
}

#[test]
fn issuance_without_time_window_is_rejected() {
    let (alice, _) = party("Alice");
    let (notary, _) = party("Notary");
    let p = TransactionBuilder::issue("hello", alice.clone(), alice, notary)
        .no_time_window()
        .build();

    match verify_proposal(&p) {
        Err(VerificationFailure::MissingTimestamp) => {}
        other => panic!("expected MissingTimestamp, got {:?}", other),
    }
}

#[tokio::test]
async fn second_move_of_retired_state_conflicts() {
    let mut net = network();
    let alice = net.add_participant("Alice", accept_all());
    let bob = net.add_participant("Bob", accept_all());
    let carol = net.add_participant("Carol", accept_all());

    let issued = alice.request_issuance("hello", alice.party()).await.unwrap();
    let original = issued.output(0).unwrap();

    let moved = alice.request_transfer(&original, bob.party()).await.unwrap();
    assert_eq!(moved.consumed(), vec![original.state_ref]);
    assert_eq!(bob.holdings().len(), 1);
    assert!(alice.holdings().is_empty());

    match alice.request_transfer(&original, carol.party()).await {
        Err(FlowError::Commit(CommitFailure::Conflict {
            state_ref,
            consumed_by,
        })) => {
            assert_eq!(state_ref, original.state_ref);
            assert_eq!(consumed_by, moved.tx_hash);
        }
        other => panic!("expected Conflict, got {:?}", other),
    }
    assert!(carol.holdings().is_empty());
    assert_eq!(net.sequencer().transaction_count(), 2);
}

#[test]
fn move_without_owner_signature_is_rejected() {
    let (alice, _) = party("Alice");
    let (bob, bob_kp) = party("Bob");
    let (mallory, mallory_kp) = party("Mallory");
    let (notary, _) = party("Notary");

    let held = StateAndRecord::new(
        StateRef::new(TxHash::of(b"issue"), 0),
        AssetRecord::new("hello", alice.clone(), alice),
    );
    let mut p = TransactionBuilder::transfer(&held, bob.clone(), notary).build();
    sign_proposal(&mut p, &mallory_kp);
    sign_proposal(&mut p, &bob_kp);

    match verify(&p, &p.signed_by()) {
        Err(VerificationFailure::MissingOwnerSignature { content, .. }) => {
            assert_eq!(content, "hello");
        }
        other => panic!("expected MissingOwnerSignature, got {:?}", other),
    }
    assert!(p.is_signed_by(&mallory.owning_key));
}

// ---------------------------------------------------------------------------
// Contract and sequencing guarantees
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lineage_cannot_be_issued_twice() {
    let mut net = network();
    let bank = net.add_participant("Bank", accept_all());
    let corp = net.add_participant("Corp", accept_all());

    corp.request_issuance("bond-7", bank.party()).await.unwrap();
    match corp.request_issuance("bond-7", bank.party()).await {
        Err(FlowError::Commit(CommitFailure::DuplicateIssuance { content, issuer })) => {
            assert_eq!(content, "bond-7");
            assert_eq!(issuer, "Bank");
        }
        other => panic!("expected DuplicateIssuance, got {:?}", other),
    }

    // Same content from a different issuer is a different lineage.
    let other_bank = net.add_participant("OtherBank", accept_all());
    corp.request_issuance("bond-7", other_bank.party())
        .await
        .unwrap();
    assert_eq!(corp.holdings().len(), 2);
}

#[test]
fn move_may_change_owner_only() {
    let (alice, alice_kp) = party("Alice");
    let (bob, _) = party("Bob");
    let (notary, _) = party("Notary");
    let held = StateAndRecord::new(
        StateRef::new(TxHash::of(b"issue"), 0),
        AssetRecord::new("hello", alice.clone(), alice.clone()),
    );

    let honest = TransactionBuilder::transfer(&held, bob.clone(), notary.clone()).build();
    assert_eq!(verify_proposal(&honest), Ok(()));

    let mut tampered_record = held.record.with_owner(bob);
    tampered_record.content = "hello, world".to_string();
    let mut tampered = TransactionBuilder::new(notary)
        .input(held)
        .output(tampered_record)
        .command(Command::new(CommandKind::Move, [alice.owning_key]))
        .window_duration(Duration::from_secs(10))
        .build();
    sign_proposal(&mut tampered, &alice_kp);
    assert!(verify_proposal(&tampered).is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_double_spend_commits_exactly_once() {
    let mut net = network();
    let bank = net.add_participant("Bank", accept_all());
    let corp = net.add_participant("Corp", accept_all());
    let alice = net.add_participant("Alice", accept_all());
    let dave = net.add_participant("Dave", accept_all());

    let issued = corp.request_issuance("deed", bank.party()).await.unwrap();
    let held = issued.output(0).unwrap();

    let (to_alice, to_dave) = tokio::join!(
        corp.request_transfer(&held, alice.party()),
        corp.request_transfer(&held, dave.party()),
    );

    let outcomes = [to_alice, to_dave];
    let wins = outcomes.iter().filter(|r| r.is_ok()).count();
    let conflicts = outcomes
        .iter()
        .filter(|r| matches!(r, Err(FlowError::Commit(CommitFailure::Conflict { .. }))))
        .count();
    assert_eq!(wins, 1);
    assert_eq!(conflicts, 1);

    assert_eq!(alice.holdings().len() + dave.holdings().len(), 1);
    assert!(net.sequencer().is_consumed(&held.state_ref));
    assert_eq!(net.sequencer().transaction_count(), 2);
}

#[test]
fn other_signatures_do_not_replace_the_owner() {
    let (alice, _) = party("Alice");
    let (bob, _) = party("Bob");
    let (notary, _) = party("Notary");
    let held = StateAndRecord::new(
        StateRef::new(TxHash::of(b"issue"), 0),
        AssetRecord::new("hello", alice.clone(), alice),
    );
    let p = TransactionBuilder::transfer(&held, bob.clone(), notary.clone()).build();

    let everyone_but_owner = BTreeSet::from([bob.owning_key, notary.owning_key]);
    match verify(&p, &everyone_but_owner) {
        Err(VerificationFailure::MissingOwnerSignature { .. }) => {}
        other => panic!("expected MissingOwnerSignature, got {:?}", other),
    }
}

#[test]
fn verification_is_repeatable() {
    let (alice, _) = party("Alice");
    let (notary, _) = party("Notary");
    let good = TransactionBuilder::issue("hello", alice.clone(), alice.clone(), notary.clone())
        .build();
    let bad = TransactionBuilder::issue("", alice.clone(), alice, notary).build();

    assert_eq!(verify_proposal(&good), verify_proposal(&good));
    assert_eq!(verify_proposal(&bad), verify_proposal(&bad));
    assert!(verify_proposal(&bad).is_err());
}

// ---------------------------------------------------------------------------
// Ownership
// ---------------------------------------------------------------------------

/// A coordinator outside any participant, so `request_transfer`'s owner
/// check never runs.
fn coordinator_for(
    net: &LocalNetwork,
    party: &Party,
    keypair: LedgerKeypair,
) -> SigningCoordinator {
    SigningCoordinator::new(
        party.clone(),
        keypair,
        net.directory().clone(),
        net.committer().clone(),
        net.config().clone(),
    )
}

#[tokio::test]
async fn non_owner_cannot_take_a_state() {
    let mut net = network();
    let bank = net.add_participant("Bank", accept_all());
    let alice = net.add_participant("Alice", accept_all());
    let mallory_kp = LedgerKeypair::generate();
    let mallory = net.add_participant_with_key("Mallory", mallory_kp.clone(), accept_all());

    let held = alice
        .request_issuance("deed", bank.party())
        .await
        .unwrap()
        .output(0)
        .unwrap();

    match mallory.request_transfer(&held, mallory.party()).await {
        Err(FlowError::Protocol(ProtocolFailure::NotOwner { state_ref, owner })) => {
            assert_eq!(state_ref, held.state_ref);
            assert_eq!(owner, "Alice");
        }
        other => panic!("expected NotOwner, got {:?}", other),
    }
    assert!(mallory.flows().is_empty());

    // Going around the participant: Alice's responder still says no.
    let proposal = TransactionBuilder::transfer(&held, mallory.party().clone(), net.notary()).build();
    let coordinator = coordinator_for(&net, mallory.party(), mallory_kp);
    match coordinator.run(proposal, &[]).await {
        Err(FlowError::Protocol(ProtocolFailure::CounterpartyRefused { party, reason })) => {
            assert_eq!(party, "Alice");
            assert!(reason.contains("is mine"), "{}", reason);
        }
        other => panic!("expected refusal, got {:?}", other),
    }

    assert_eq!(alice.holdings(), vec![held]);
    assert!(mallory.holdings().is_empty());
    assert_eq!(net.sequencer().transaction_count(), 1);
}

#[tokio::test]
async fn whitelisted_issuer_does_not_co_sign_a_move_of_its_own_state() {
    let mut net = network();
    let alice = net.add_participant("Alice", whitelist(&["Alice"]));
    let mallory_kp = LedgerKeypair::generate();
    let mallory = net.add_participant_with_key("Mallory", mallory_kp.clone(), accept_all());

    let held = alice
        .request_issuance("hello", alice.party())
        .await
        .unwrap()
        .output(0)
        .unwrap();

    assert!(matches!(
        mallory.request_transfer(&held, mallory.party()).await,
        Err(FlowError::Protocol(ProtocolFailure::NotOwner { .. }))
    ));

    let proposal = TransactionBuilder::transfer(&held, mallory.party().clone(), net.notary()).build();
    let coordinator = coordinator_for(&net, mallory.party(), mallory_kp);
    match coordinator.run(proposal, &[]).await {
        Err(FlowError::Protocol(ProtocolFailure::CounterpartyRefused { party, .. })) => {
            assert_eq!(party, "Alice");
        }
        other => panic!("expected refusal, got {:?}", other),
    }

    assert_eq!(alice.holdings(), vec![held]);
    assert!(mallory.holdings().is_empty());
}

// ---------------------------------------------------------------------------
// Whitelisted issuance
// ---------------------------------------------------------------------------

#[tokio::test]
async fn non_whitelisted_issuer_refuses() {
    let mut net = network();
    let rogue = net.add_participant("Rogue", whitelist(&["Bank"]));
    let corp = net.add_participant("Corp", accept_all());

    match corp.request_issuance("t", rogue.party()).await {
        Err(FlowError::Protocol(ProtocolFailure::CounterpartyRefused { party, reason })) => {
            assert_eq!(party, "Rogue");
            assert_eq!(reason, "I must be a whitelisted node");
        }
        other => panic!("expected refusal, got {:?}", other),
    }
    assert_eq!(net.sequencer().transaction_count(), 0);
    assert!(corp.holdings().is_empty());

    let flows = corp.flows();
    assert_eq!(flows.len(), 1);
    assert!(flows.in_flight().is_empty());
}

#[tokio::test]
async fn issue_then_move_back_to_issuer() {
    let mut net = network();
    let bank = net.add_participant("Bank", whitelist(&["Bank"]));
    let corp = net.add_participant("Corp", accept_all());

    let issued = corp.request_issuance_from("thought-1", "Bank").await.unwrap();
    let held = issued.output(0).unwrap();
    assert_eq!(corp.holdings(), vec![held.clone()]);
    // The issuer's vault tracks it as well.
    assert_eq!(bank.vault().get(&held.state_ref), Some(held.clone()));

    let returned = corp.request_transfer_to(&held, "Bank").await.unwrap();
    assert!(corp.holdings().is_empty());
    let bank_held = bank.holdings();
    assert_eq!(bank_held.len(), 1);
    assert_eq!(bank_held[0].state_ref.tx_hash, returned.tx_hash);
    assert_eq!(bank_held[0].record.lineage(), held.record.lineage());
}

#[tokio::test]
async fn whitelisted_issuer_refuses_move_to_someone_else() {
    let mut net = network();
    let bank = net.add_participant("Bank", whitelist(&["Bank"]));
    let corp = net.add_participant("Corp", accept_all());
    let carol = net.add_participant("Carol", whitelist(&["Bank"]));

    let held = corp
        .request_issuance("thought-2", bank.party())
        .await
        .unwrap()
        .output(0)
        .unwrap();

    match corp.request_transfer(&held, carol.party()).await {
        Err(FlowError::Protocol(ProtocolFailure::CounterpartyRefused { reason, .. })) => {
            assert_eq!(reason, "The issuer of an asset must be the issuing node");
        }
        other => panic!("expected refusal, got {:?}", other),
    }
    assert_eq!(corp.holdings(), vec![held]);
}

#[tokio::test]
async fn unknown_counterparty_by_name() {
    let mut net = network();
    let corp = net.add_participant("Corp", accept_all());

    match corp.request_issuance_from("t", "Nobody").await {
        Err(FlowError::Protocol(ProtocolFailure::UnknownCounterparty(name))) => {
            assert_eq!(name, "Nobody");
        }
        other => panic!("expected UnknownCounterparty, got {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn expired_window_is_rejected_even_when_fully_signed() {
    let config = LedgerConfig::default().with_time_window(Duration::ZERO);
    let mut net = LocalNetwork::new(config, "Notary");
    let bank = net.add_participant("Bank", accept_all());
    let corp = net.add_participant("Corp", accept_all());

    match corp.request_issuance("late", bank.party()).await {
        Err(FlowError::Commit(CommitFailure::ExpiredTimeWindow { until, now })) => {
            assert!(now >= until);
        }
        other => panic!("expected ExpiredTimeWindow, got {:?}", other),
    }
    assert_eq!(net.sequencer().transaction_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn silent_counterparty_times_out() {
    let config = LedgerConfig::default().with_counterparty_timeout(Duration::from_millis(50));
    let mut net = LocalNetwork::new(config, "Notary");
    let bank = net.add_participant("Bank", stalling(Duration::from_millis(400)));
    let corp = net.add_participant("Corp", accept_all());

    match corp.request_issuance("slow", bank.party()).await {
        Err(FlowError::Protocol(ProtocolFailure::Timeout { waited_ms })) => {
            assert_eq!(waited_ms, 50);
        }
        other => panic!("expected Timeout, got {:?}", other),
    }
    assert_eq!(net.sequencer().transaction_count(), 0);
    assert!(corp.holdings().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn abandoned_flow_leaves_ledger_untouched() {
    let mut net = network();
    let bank = net.add_participant("Bank", stalling(Duration::from_millis(300)));
    let corp = net.add_participant("Corp", accept_all());

    let abandoned = tokio::time::timeout(
        Duration::from_millis(30),
        corp.request_issuance("dropped", bank.party()),
    )
    .await;
    assert!(abandoned.is_err());

    // Let the responder finish; its reply goes nowhere.
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(net.sequencer().transaction_count(), 0);
    assert!(corp.holdings().is_empty());
    assert_eq!(corp.flows().len(), 1);
    assert!(corp.flows().in_flight().is_empty());
}

// ---------------------------------------------------------------------------
// Vault subscriptions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn subscription_delivers_owned_commits() {
    let mut net = network();
    let bank = net.add_participant("Bank", accept_all());
    let corp = net.add_participant("Corp", accept_all());

    let mut corp_feed = Box::pin(corp.vault().subscribe(corp.party()));
    let mut bank_feed = Box::pin(bank.vault().subscribe(bank.party()));

    let issued = corp.request_issuance("feed", bank.party()).await.unwrap();

    let event = tokio::time::timeout(Duration::from_secs(1), corp_feed.next())
        .await
        .expect("event delivered")
        .expect("stream open");
    assert_eq!(event.tx_hash, issued.tx_hash);
    assert_eq!(event.state, issued.output(0).unwrap());

    // Bank issued it but does not own it.
    assert!(
        tokio::time::timeout(Duration::from_millis(50), bank_feed.next())
            .await
            .is_err()
    );

    // Dropping the stream unsubscribes; later commits still land in the vault.
    drop(corp_feed);
    corp.request_issuance("after", bank.party()).await.unwrap();
    assert_eq!(corp.holdings().len(), 2);
}

#[tokio::test]
async fn flow_reaches_committed_state() {
    let mut net = network();
    let bank = net.add_participant("Bank", accept_all());
    let corp = net.add_participant("Corp", accept_all());

    let committed = corp.request_issuance("tracked", bank.party()).await.unwrap();
    let flows = corp.flows();
    assert_eq!(flows.len(), 1);
    assert!(flows.in_flight().is_empty());

    let notary = net.notary();
    assert!(notary
        .owning_key
        .verify(committed.tx_hash.as_bytes(), &committed.notary_signature.signature));
    assert_eq!(committed.notary_signature.by, notary.owning_key);
}
