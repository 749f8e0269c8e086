//! End-to-end replacement runs between in-memory nodes

#![allow(clippy::unwrap_used)]

mod common;

use assert_matches::assert_matches;
use async_trait::async_trait;
use common::*;
use replace_core::{
    IdentityEffects, KeyPair, Party, SessionId, SignedTransaction, StateAndRef, StorageEffects,
};
use replace_protocol::{
    AcceptorOutcome, AssembledTx, Handshake, HandshakeAck, Instigator, NotaryChange, Proposal,
    ProtocolError, RejectionOrigin, ReplacementConfig, ReplacementKind, ReplacementResult,
    SignatureSet, ValidationError, WaitPoint, TOPIC_CHANGE, TOPIC_INITIATE,
};
use replace_testkit::{init_test_tracing, Directory, MemoryTransactionStore, MockNode, TestNetwork};
use std::sync::Arc;
use std::time::Duration;

fn instigator(node: &Arc<MockNode>, config: ReplacementConfig) -> Instigator<NotaryChange, MockNode> {
    Instigator::new(Arc::new(NotaryChange), Arc::clone(node), config)
}

#[tokio::test]
async fn test_two_party_notary_change_is_recorded_by_both() {
    let fx = two_party().await;
    let acceptor = spawn_acceptor(NotaryChange, &fx.bob, ReplacementConfig::default());

    let report = instigator(&fx.alice, ReplacementConfig::default())
        .run_with_report(fx.state.clone(), fx.notary_b.party().clone())
        .await
        .unwrap();

    // Bob's signature and the notary's were gathered; Alice signed locally.
    assert_eq!(report.collected.len(), 2);
    let final_tx = &report.transaction;
    assert_eq!(final_tx.sigs().len(), 3);
    assert!(final_tx.verify_signatures().is_ok());
    let signers = final_tx.signing_keys();
    assert!(signers.contains(&fx.alice.party().owning_key));
    assert!(signers.contains(&fx.bob.party().owning_key));
    assert!(signers.contains(&fx.notary_a.party().owning_key));

    assert_eq!(report.successor.state.notary, *fx.notary_b.party());
    assert_eq!(report.successor.state.data, fx.state.state.data);
    assert_eq!(report.successor.state_ref.txhash, final_tx.id());

    let outcome = acceptor.await.unwrap().unwrap();
    assert_matches!(
        outcome,
        AcceptorOutcome::Recorded { ref transaction, newly_recorded: true } if transaction == final_tx
    );
    assert_eq!(fx.alice.transaction(&final_tx.id()).await.unwrap().as_ref(), Some(final_tx));
    assert_eq!(fx.bob.transaction(&final_tx.id()).await.unwrap().as_ref(), Some(final_tx));
    assert_eq!(fx.notary_a.consumed_by(&fx.state.state_ref), Some(final_tx.id()));
}

#[tokio::test]
async fn test_refusal_aborts_run_and_records_nothing() {
    let fx = two_party().await;
    let acceptor = spawn_acceptor(DistrustfulNotaryChange, &fx.bob, ReplacementConfig::default());

    let err = instigator(&fx.alice, ReplacementConfig::default())
        .run(fx.state.clone(), fx.notary_b.party().clone())
        .await
        .unwrap_err();

    assert_matches!(
        &err,
        ProtocolError::StateReplacementRejected { refusal, origin: RejectionOrigin::Refused }
            if refusal.detail.as_deref() == Some("notary not trusted")
                && refusal.identity == *fx.bob.party()
                && refusal.state_ref == fx.state.state_ref
    );
    assert!(!err.is_timeout());
    assert_matches!(acceptor.await.unwrap(), Ok(AcceptorOutcome::Rejected(_)));

    // Only the issuance is stored anywhere, and the notary never saw the state.
    assert_eq!(fx.alice.store().len(), 1);
    assert_eq!(fx.bob.store().len(), 1);
    assert!(fx.notary_a.consumed_by(&fx.state.state_ref).is_none());
}

/// Refuses like [`DistrustfulNotaryChange`], after a delay
struct HesitantNotaryChange(Duration);

#[async_trait]
impl ReplacementKind for HesitantNotaryChange {
    type Modification = Party;

    fn name(&self) -> &'static str {
        "hesitant-notary-change"
    }

    fn assemble_tx(
        &self,
        original: &StateAndRef,
        modification: &Party,
        identity: &dyn IdentityEffects,
    ) -> replace_core::Result<AssembledTx> {
        NotaryChange.assemble_tx(original, modification, identity)
    }

    async fn verify_proposal(
        &self,
        proposal: &Proposal<Party>,
        identity: &dyn IdentityEffects,
    ) -> Result<(), ValidationError> {
        tokio::time::sleep(self.0).await;
        DistrustfulNotaryChange
            .verify_proposal(proposal, identity)
            .await
    }
}

#[tokio::test]
async fn test_one_refusal_among_three_leaves_signers_unrecorded() {
    init_test_tracing();
    let net = TestNetwork::new();
    let alice = net.create_node("alice");
    let bob = net.create_node("bob");
    let carol = net.create_node("carol");
    let notary_a = net.create_notary("notary-a");
    let notary_b = net.create_notary("notary-b");
    let state = net
        .issue_state(&[&alice, &bob, &carol], notary_a.party(), b"100 units")
        .await
        .unwrap();

    let bob_config = ReplacementConfig {
        signature_set_timeout_ms: 300,
        ..ReplacementConfig::default()
    };
    let bob_run = spawn_acceptor(NotaryChange, &bob, bob_config);
    // Carol answers only after Bob has signed.
    let carol_run = spawn_acceptor(
        HesitantNotaryChange(Duration::from_millis(100)),
        &carol,
        ReplacementConfig::default(),
    );

    let err = instigator(&alice, ReplacementConfig::default())
        .run(state.clone(), notary_b.party().clone())
        .await
        .unwrap_err();
    assert_matches!(
        &err,
        ProtocolError::StateReplacementRejected { refusal, origin: RejectionOrigin::Refused }
            if refusal.identity == *carol.party()
                && refusal.detail.as_deref() == Some("notary not trusted")
    );

    assert_matches!(carol_run.await.unwrap(), Ok(AcceptorOutcome::Rejected(_)));
    assert_matches!(
        bob_run.await.unwrap(),
        Err(ProtocolError::Timeout { wait_point: WaitPoint::SignatureSet, ref peer, .. })
            if peer == "alice"
    );
    for node in [&alice, &bob, &carol] {
        assert_eq!(node.store().len(), 1, "{} recorded the replacement", node.name());
    }
    assert!(notary_a.consumed_by(&state.state_ref).is_none());
}

#[tokio::test]
async fn test_change_to_non_notary_is_refused() {
    let fx = two_party().await;
    let acceptor = spawn_acceptor(NotaryChange, &fx.bob, ReplacementConfig::default());
    let carol = fx.net.create_node("carol");

    let err = instigator(&fx.alice, ReplacementConfig::default())
        .run(fx.state.clone(), carol.party().clone())
        .await
        .unwrap_err();

    assert_eq!(
        err.refusal().and_then(|refusal| refusal.detail.clone()).as_deref(),
        Some("The proposed node carol does not run a Notary service")
    );
    assert_matches!(acceptor.await.unwrap(), Ok(AcceptorOutcome::Rejected(_)));
    assert_eq!(fx.bob.store().len(), 1);
}

#[tokio::test]
async fn test_rule_engine_failure_becomes_refusal() {
    let fx = two_party().await;
    fx.bob.fail_validation_with("asset is frozen");
    let acceptor = spawn_acceptor(NotaryChange, &fx.bob, ReplacementConfig::default());

    let err = instigator(&fx.alice, ReplacementConfig::default())
        .run(fx.state.clone(), fx.notary_b.party().clone())
        .await
        .unwrap_err();

    let detail = err.refusal().unwrap().detail.clone().unwrap();
    assert!(detail.contains("asset is frozen"), "{detail}");
    assert_matches!(acceptor.await.unwrap(), Ok(AcceptorOutcome::Rejected(_)));
    assert_eq!(fx.alice.store().len(), 1);
}

#[tokio::test]
async fn test_signature_under_wrong_key_fails_before_notarisation() {
    let fx = two_party().await;
    let bob = Arc::clone(&fx.bob);
    let alice_party = fx.alice.party().clone();

    // Bob's side answers with a signature made by some other key.
    let impostor = tokio::spawn(async move {
        let handshake = receive_envelope::<Handshake>(&bob, TOPIC_INITIATE, SessionId::HANDSHAKE)
            .await
            .payload;
        send_envelope(
            &bob,
            &alice_party,
            TOPIC_INITIATE,
            handshake.receive_session_id,
            &HandshakeAck {
                send_session_id: handshake.send_session_id,
            },
        )
        .await;
        let proposal =
            receive_envelope::<Proposal<Party>>(&bob, TOPIC_CHANGE, handshake.send_session_id)
                .await
                .payload;
        let forged = KeyPair::from_label("mallory").sign(proposal.transaction.tx_bits());
        send_envelope(
            &bob,
            &alice_party,
            TOPIC_CHANGE,
            handshake.receive_session_id,
            &ReplacementResult::signature(forged),
        )
        .await;
        proposal.transaction.id()
    });

    let err = instigator(&fx.alice, ReplacementConfig::default())
        .run(fx.state.clone(), fx.notary_b.party().clone())
        .await
        .unwrap_err();
    let proposed_id = impostor.await.unwrap();

    assert_matches!(
        &err,
        ProtocolError::SignatureValidationFailed { party, .. } if party == "bob"
    );
    assert!(err.is_signature_failure());
    assert!(!err.is_rejection());
    assert!(fx.notary_a.consumed_by(&fx.state.state_ref).is_none());
    assert!(!fx.alice.store().contains(&proposed_id));
    assert!(!fx.bob.store().contains(&proposed_id));
}

#[tokio::test]
async fn test_single_signer_goes_straight_to_notary() {
    init_test_tracing();
    let net = TestNetwork::new();
    let alice = net.create_node("alice");
    let _bob = net.create_node("bob");
    let notary_a = net.create_notary("notary-a");
    let notary_b = net.create_notary("notary-b");
    let state = net
        .issue_state(&[&alice], notary_a.party(), b"solo")
        .await
        .unwrap();

    let report = instigator(&alice, ReplacementConfig::default())
        .run_with_report(state.clone(), notary_b.party().clone())
        .await
        .unwrap();

    assert!(net.network().sent_messages().is_empty());
    assert_eq!(report.collected.len(), 1);
    assert_eq!(report.collected[0].by, notary_a.party().owning_key);
    assert_eq!(report.transaction.sigs().len(), 2);
    assert!(report.transaction.missing_signers().unwrap().is_empty());
    assert!(alice.store().contains(&report.transaction.id()));
    assert_eq!(report.successor.state.notary, *notary_b.party());
}

#[tokio::test]
async fn test_silent_participant_times_out_as_rejection() {
    let fx = two_party().await;
    let bob = Arc::clone(&fx.bob);
    let alice_party = fx.alice.party().clone();

    // Bob acknowledges and takes the proposal, then never answers.
    let silent = tokio::spawn(async move {
        let handshake = receive_envelope::<Handshake>(&bob, TOPIC_INITIATE, SessionId::HANDSHAKE)
            .await
            .payload;
        send_envelope(
            &bob,
            &alice_party,
            TOPIC_INITIATE,
            handshake.receive_session_id,
            &HandshakeAck {
                send_session_id: handshake.send_session_id,
            },
        )
        .await;
        receive_envelope::<Proposal<Party>>(&bob, TOPIC_CHANGE, handshake.send_session_id)
            .await
            .payload
    });

    let err = instigator(&fx.alice, ReplacementConfig::with_uniform_timeout(200))
        .run(fx.state.clone(), fx.notary_b.party().clone())
        .await
        .unwrap_err();
    let proposal = silent.await.unwrap();

    assert_matches!(
        &err,
        ProtocolError::StateReplacementRejected { refusal, origin: RejectionOrigin::TimedOut }
            if refusal.identity == *fx.bob.party() && refusal.state_ref == fx.state.state_ref
    );
    assert!(err.is_rejection());
    assert!(err.is_timeout());
    assert!(!fx.alice.store().contains(&proposal.transaction.id()));
    assert!(fx.notary_a.consumed_by(&fx.state.state_ref).is_none());
}

#[tokio::test]
async fn test_unreachable_participant_times_out_at_handshake() {
    let fx = two_party().await;
    fx.net.network().isolate(fx.bob.name());

    let err = instigator(&fx.alice, ReplacementConfig::with_uniform_timeout(100))
        .run(fx.state.clone(), fx.notary_b.party().clone())
        .await
        .unwrap_err();

    assert_matches!(
        err,
        ProtocolError::StateReplacementRejected { origin: RejectionOrigin::TimedOut, .. }
    );
    assert_eq!(fx.alice.store().len(), 1);
}

#[tokio::test]
async fn test_unknown_participant_fails_before_any_traffic() {
    let fx = two_party().await;
    let ghost_keys = KeyPair::from_label("ghost");
    let ghost = Arc::new(MockNode::new(
        Party::new("ghost", ghost_keys.public()),
        ghost_keys,
        Arc::clone(fx.net.network()),
        Directory::new(),
        Arc::new(MemoryTransactionStore::new()),
    ));
    let state = fx
        .net
        .issue_state(&[&fx.alice, &ghost], fx.notary_a.party(), b"shared with a stranger")
        .await
        .unwrap();

    let err = instigator(&fx.alice, ReplacementConfig::default())
        .run(state, fx.notary_b.party().clone())
        .await
        .unwrap_err();

    assert_matches!(
        err,
        ProtocolError::UnknownParticipant { key } if key == ghost.party().owning_key
    );
    assert!(fx.net.network().sent_messages().is_empty());
}

#[tokio::test]
async fn test_replay_under_fresh_session_is_a_no_op() {
    let fx = two_party().await;
    let acceptor = spawn_acceptor(NotaryChange, &fx.bob, ReplacementConfig::default());
    let report = instigator(&fx.alice, ReplacementConfig::default())
        .run_with_report(fx.state.clone(), fx.notary_b.party().clone())
        .await
        .unwrap();
    acceptor.await.unwrap().unwrap();
    let recorded = report.transaction.clone();
    let stored_before = fx.bob.store().len();

    // Alice replays the same proposal and signature set on a new session pair.
    let replay = spawn_acceptor(NotaryChange, &fx.bob, ReplacementConfig::default());
    let send_session_id = SessionId::random();
    let receive_session_id = SessionId::random();
    send_envelope(
        &fx.alice,
        fx.bob.party(),
        TOPIC_INITIATE,
        SessionId::HANDSHAKE,
        &Handshake {
            send_session_id,
            reply_to: fx.alice.party().clone(),
            receive_session_id,
        },
    )
    .await;
    let ack = receive_envelope::<HandshakeAck>(&fx.alice, TOPIC_INITIATE, receive_session_id)
        .await
        .payload;
    assert_eq!(ack.send_session_id, send_session_id);

    let unsigned = SignedTransaction::new(recorded.tx_bits().to_vec(), Vec::new());
    send_envelope(
        &fx.alice,
        fx.bob.party(),
        TOPIC_CHANGE,
        send_session_id,
        &Proposal::new(fx.state.state_ref, fx.notary_b.party().clone(), unsigned),
    )
    .await;
    let result = receive_envelope::<ReplacementResult>(&fx.alice, TOPIC_CHANGE, receive_session_id)
        .await
        .payload;
    assert!(result.is_signature());
    send_envelope(
        &fx.alice,
        fx.bob.party(),
        TOPIC_CHANGE,
        send_session_id,
        &SignatureSet(recorded.sigs().to_vec()),
    )
    .await;

    assert_matches!(
        replay.await.unwrap(),
        Ok(AcceptorOutcome::Recorded { newly_recorded: false, .. })
    );
    assert_eq!(fx.bob.store().len(), stored_before);
    assert_eq!(fx.bob.store().get(&recorded.id()), Some(recorded));
}

#[tokio::test]
async fn test_double_spend_is_refused_by_notary() {
    let fx = two_party().await;
    let first = spawn_acceptor(NotaryChange, &fx.bob, ReplacementConfig::default());
    instigator(&fx.alice, ReplacementConfig::default())
        .run(fx.state.clone(), fx.notary_b.party().clone())
        .await
        .unwrap();
    first.await.unwrap().unwrap();

    // Spend the already-replaced state again, towards a third notary.
    let notary_c = fx.net.create_notary("notary-c");
    let config = ReplacementConfig::with_uniform_timeout(300);
    let second = spawn_acceptor(NotaryChange, &fx.bob, config.clone());
    let err = instigator(&fx.alice, config)
        .run(fx.state.clone(), notary_c.party().clone())
        .await
        .unwrap_err();

    assert_matches!(err, ProtocolError::Notarisation { reason } if reason.contains("double spend"));
    // Bob signed but never received a signature set, so recorded nothing new.
    assert_matches!(
        second.await.unwrap(),
        Err(ProtocolError::Timeout { .. })
    );
    assert_eq!(fx.alice.store().len(), 2);
    assert_eq!(fx.bob.store().len(), 2);
}

#[tokio::test]
async fn test_slow_notary_times_out() {
    init_test_tracing();
    let net = TestNetwork::new();
    let alice = net.create_node("alice");
    let notary_a = net.create_notary("notary-a");
    let notary_b = net.create_notary("notary-b");
    let state = net
        .issue_state(&[&alice], notary_a.party(), b"solo")
        .await
        .unwrap();
    notary_a.set_delay(std::time::Duration::from_millis(500));

    let err = instigator(&alice, ReplacementConfig::with_uniform_timeout(50))
        .run(state, notary_b.party().clone())
        .await
        .unwrap_err();

    assert_matches!(
        err,
        ProtocolError::Timeout { wait_point: replace_protocol::WaitPoint::Notarisation, .. }
    );
    assert_eq!(alice.store().len(), 1);
}
