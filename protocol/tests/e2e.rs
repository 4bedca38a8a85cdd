//! End-to-end tests for the QR handoff.
//!
//! Two dispatchers stand in for two phones. "Showing" a code is reading the
//! dispatcher's outgoing payload; "scanning" it is submitting that text to
//! the other dispatcher. Each test builds its own pair of wallets.

use std::sync::Arc;

use offpay_protocol::handoff::{decode, ProtocolMessage};
use offpay_protocol::wallet::LedgerKind;
use offpay_protocol::{
    Identity, MemoryWallet, Money, ProtocolEngine, RejectReason, Role, ScanDispatcher,
    ScanOutcome, Step, TransactionId, Wallet,
};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn money(major: u64) -> Money {
    Money::from_major(major).unwrap()
}

struct Device {
    dispatcher: ScanDispatcher,
    wallet: Arc<MemoryWallet>,
}

fn device(name: &str, balance: Money) -> Device {
    let wallet = Arc::new(MemoryWallet::new(Identity::new(name), balance));
    let engine = ProtocolEngine::new(Identity::new(name));
    Device {
        dispatcher: ScanDispatcher::new(engine, wallet.clone()),
        wallet,
    }
}

/// `to` scans whatever `from` is showing.
fn relay(from: &Device, to: &Device) -> ScanOutcome {
    let shown = from
        .dispatcher
        .snapshot()
        .outgoing
        .expect("device should be showing a code");
    to.dispatcher.submit(&shown)
}

fn step_of(outcome: &ScanOutcome) -> Option<Step> {
    match outcome {
        ScanOutcome::Accepted { step, .. } => Some(*step),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Full handoff
// ---------------------------------------------------------------------------

#[test]
fn two_devices_complete_a_transfer() {
    let alice = device("alice", money(100));
    let bob = device("bob", money(5));

    bob.dispatcher.begin_receiver();
    alice.dispatcher.begin_sender(money(40)).unwrap();

    assert_eq!(step_of(&relay(&bob, &alice)), Some(Step::Init));
    assert_eq!(alice.wallet.balance(), money(100));

    assert_eq!(step_of(&relay(&alice, &bob)), Some(Step::Ack));
    assert_eq!(bob.dispatcher.snapshot().amount, money(40));

    assert_eq!(step_of(&relay(&bob, &alice)), Some(Step::Commit));
    assert_eq!(alice.wallet.balance(), money(60));

    assert_eq!(step_of(&relay(&alice, &bob)), Some(Step::Success));
    assert_eq!(bob.wallet.balance(), money(45));

    assert_eq!(step_of(&relay(&bob, &alice)), Some(Step::Success));

    let a = alice.dispatcher.snapshot();
    let b = bob.dispatcher.snapshot();
    assert_eq!(a.status, "Transfer Complete!");
    assert_eq!(b.status, "Success!");
    assert!(a.outgoing.is_none());
    assert_eq!(a.tx_id, b.tx_id);
    assert_eq!(a.counterpart, Some(Identity::new("bob")));
    assert_eq!(b.counterpart, Some(Identity::new("alice")));

    assert_eq!(alice.wallet.count(LedgerKind::Debit), 1);
    assert_eq!(bob.wallet.count(LedgerKind::Credit), 1);
}

#[test]
fn camera_repeats_do_not_repeat_money() {
    let alice = device("alice", money(100));
    let bob = device("bob", money(0));
    bob.dispatcher.begin_receiver();
    alice.dispatcher.begin_sender(money(25)).unwrap();

    // Each side keeps scanning whatever the other shows, many times per
    // step, in the wrong order as often as the right one.
    for _ in 0..30 {
        relay(&bob, &alice);
        relay(&bob, &alice);
        if alice.dispatcher.snapshot().outgoing.is_none() {
            break;
        }
        relay(&alice, &bob);
        relay(&alice, &bob);
    }

    assert_eq!(alice.dispatcher.snapshot().step, Step::Success);
    assert_eq!(bob.dispatcher.snapshot().step, Step::Success);
    assert_eq!(alice.wallet.balance(), money(75));
    assert_eq!(bob.wallet.balance(), money(25));
    assert_eq!(alice.wallet.count(LedgerKind::Debit), 1);
    assert_eq!(bob.wallet.count(LedgerKind::Credit), 1);
}

#[test]
fn tx_id_is_minted_once_and_shared() {
    let alice = device("alice", money(100));
    let bob = device("bob", money(0));
    bob.dispatcher.begin_receiver();
    alice.dispatcher.begin_sender(money(10)).unwrap();

    relay(&bob, &alice);
    let minted = alice.dispatcher.snapshot().tx_id.unwrap();

    relay(&alice, &bob);
    relay(&bob, &alice);
    relay(&alice, &bob);

    assert_eq!(alice.dispatcher.snapshot().tx_id.as_ref(), Some(&minted));
    assert_eq!(bob.dispatcher.snapshot().tx_id.as_ref(), Some(&minted));
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn scenario_a_request_produces_init() {
    let alice = device("alice", money(100));
    alice.dispatcher.begin_sender(money(40)).unwrap();

    let outcome = alice.dispatcher.submit(r#"{"type":"REQUEST","to":"bob"}"#);
    assert_eq!(step_of(&outcome), Some(Step::Init));

    let snap = alice.dispatcher.snapshot();
    assert_eq!(snap.step, Step::Init);
    assert_eq!(alice.wallet.balance(), money(100));

    match decode(&snap.outgoing.unwrap()).unwrap() {
        ProtocolMessage::Init {
            tx_id,
            from,
            to,
            amount,
        } => {
            assert_eq!(Some(tx_id), snap.tx_id);
            assert_eq!(from, Identity::new("alice"));
            assert_eq!(to, Identity::new("bob"));
            assert_eq!(amount, money(40));
        }
        other => panic!("expected INIT, got {other:?}"),
    }
}

#[test]
fn scenario_b_ack_debits() {
    let alice = device("alice", money(100));
    alice.dispatcher.begin_sender(money(40)).unwrap();
    alice.dispatcher.submit(r#"{"type":"REQUEST","to":"bob"}"#);
    let tx = alice.dispatcher.snapshot().tx_id.unwrap();

    let outcome = alice
        .dispatcher
        .submit(&format!(r#"{{"type":"ACK","tx_id":"{tx}"}}"#));

    assert_eq!(step_of(&outcome), Some(Step::Commit));
    assert_eq!(alice.wallet.balance(), money(60));
}

#[test]
fn scenario_c_insufficient_balance() {
    let alice = device("alice", money(10));
    alice.dispatcher.begin_sender(money(40)).unwrap();

    let outcome = alice.dispatcher.submit(r#"{"type":"REQUEST","to":"bob"}"#);

    assert_eq!(outcome, ScanOutcome::Rejected(RejectReason::InsufficientBalance));
    assert_eq!(alice.dispatcher.snapshot().step, Step::Request);
    assert_eq!(alice.wallet.balance(), money(10));
    assert!(alice.dispatcher.snapshot().outgoing.is_none());
}

#[test]
fn scenario_d_commit_for_other_transaction() {
    let bob = device("bob", money(0));
    bob.dispatcher.begin_receiver();
    let init = ProtocolMessage::init(
        TransactionId::new("X"),
        Identity::new("alice"),
        Identity::new("bob"),
        money(40),
    );
    bob.dispatcher.submit(&init.encode());

    let outcome = bob.dispatcher.submit(r#"{"type":"COMMIT","tx_id":"Y"}"#);

    assert_eq!(outcome, ScanOutcome::Rejected(RejectReason::TxMismatch));
    assert_eq!(bob.dispatcher.snapshot().step, Step::Ack);
    assert_eq!(bob.wallet.balance(), Money::ZERO);
    assert_eq!(bob.wallet.count(LedgerKind::Credit), 0);
}

#[test]
fn scenario_e_init_for_someone_else() {
    let bob = device("bob", money(0));
    bob.dispatcher.begin_receiver();

    let outcome = bob.dispatcher.submit(
        r#"{"type":"INIT","tx_id":"X","from":"alice","to":"not-me","amount":40}"#,
    );

    assert_eq!(outcome, ScanOutcome::Rejected(RejectReason::IdentityMismatch));
    let snap = bob.dispatcher.snapshot();
    assert!(snap.tx_id.is_none());
    assert_eq!(snap.step, Step::Request);
    assert_eq!(snap.amount, Money::ZERO);
}

// ---------------------------------------------------------------------------
// Interop and edge cases
// ---------------------------------------------------------------------------

#[test]
fn lenient_peer_payloads_are_accepted() {
    let bob = device("bob", money(0));
    bob.dispatcher.begin_receiver();

    // Fractional amount, extra field, missing status literal.
    bob.dispatcher.submit(
        r#"{"type":"INIT","tx_id":"X","from":"alice","to":"bob","amount":12.5,"memo":"lunch"}"#,
    );
    assert_eq!(bob.dispatcher.snapshot().amount, Money::from_minor(1250));

    let outcome = bob.dispatcher.submit(r#"{"type":"COMMIT","tx_id":"X"}"#);
    assert_eq!(step_of(&outcome), Some(Step::Success));
    assert_eq!(bob.wallet.balance(), Money::from_minor(1250));
}

#[test]
fn failed_credit_still_completes_handoff() {
    let bob = device("bob", Money::from_minor(u64::MAX));
    bob.dispatcher.begin_receiver();
    bob.dispatcher.submit(
        &ProtocolMessage::init(
            TransactionId::new("X"),
            Identity::new("alice"),
            Identity::new("bob"),
            money(1),
        )
        .encode(),
    );

    let outcome = bob.dispatcher.submit(r#"{"type":"COMMIT","tx_id":"X","status":"DONE"}"#);

    assert_eq!(step_of(&outcome), Some(Step::Success));
    assert_eq!(bob.wallet.balance(), Money::from_minor(u64::MAX));
    assert_eq!(bob.wallet.count(LedgerKind::Credit), 0);
}

#[test]
fn cancel_after_debit_keeps_funds_debited() {
    let alice = device("alice", money(100));
    let bob = device("bob", money(0));
    bob.dispatcher.begin_receiver();
    alice.dispatcher.begin_sender(money(40)).unwrap();
    relay(&bob, &alice);
    relay(&alice, &bob);
    relay(&bob, &alice);
    assert_eq!(alice.dispatcher.snapshot().step, Step::Commit);

    let idle = alice.dispatcher.reset();
    assert!(idle.role.is_none());
    assert_eq!(alice.wallet.balance(), money(60));

    // Bob never sees a COMMIT, so nothing is credited.
    assert_eq!(bob.wallet.balance(), Money::ZERO);
}

#[test]
fn role_is_fixed_for_the_session() {
    let alice = device("alice", money(100));
    alice.dispatcher.begin(Role::Sender, Some(money(1))).unwrap();

    for frame in [
        r#"{"type":"INIT","tx_id":"X","from":"carol","to":"alice","amount":1}"#,
        r#"{"type":"COMMIT","tx_id":"X"}"#,
    ] {
        assert_eq!(
            alice.dispatcher.submit(frame),
            ScanOutcome::Rejected(RejectReason::WrongRole)
        );
    }
    assert_eq!(alice.dispatcher.snapshot().role, Some(Role::Sender));
}

#[test]
fn concurrent_scans_on_shared_dispatcher() {
    let alice = Arc::new(device("alice", money(100)));
    alice.dispatcher.begin_sender(money(40)).unwrap();
    alice.dispatcher.submit(r#"{"type":"REQUEST","to":"bob"}"#);
    let tx = alice.dispatcher.snapshot().tx_id.unwrap();
    let frame = format!(r#"{{"type":"ACK","tx_id":"{tx}"}}"#);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let alice = Arc::clone(&alice);
            let frame = frame.clone();
            std::thread::spawn(move || {
                (0..100)
                    .filter(|_| alice.dispatcher.submit(&frame).is_accepted())
                    .count()
            })
        })
        .collect();
    let accepted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    assert_eq!(accepted, 1);
    assert_eq!(alice.wallet.balance(), money(60));
    assert_eq!(alice.wallet.count(LedgerKind::Debit), 1);
}
