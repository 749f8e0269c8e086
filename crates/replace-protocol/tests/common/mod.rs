//! Shared fixtures for multi-party replacement tests

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

use async_trait::async_trait;
use replace_core::{
    IdentityEffects, MessagingEffects, Party, SessionId, StateAndRef, Topic, WireEnvelope,
};
use replace_protocol::{
    AcceptorOutcome, AssembledTx, NotaryChange, Proposal, ProtocolError, ReplacementConfig,
    ReplacementKind, ReplacementService, ValidationError,
};
use replace_testkit::{init_test_tracing, MockNode, MockNotary, TestNetwork};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;

pub const MAX_PAYLOAD: usize = 4 * 1024 * 1024;

/// Alice and Bob co-own a state controlled by notary A; notary B also exists
pub struct TwoParty {
    pub net: TestNetwork,
    pub alice: Arc<MockNode>,
    pub bob: Arc<MockNode>,
    pub notary_a: Arc<MockNotary>,
    pub notary_b: Arc<MockNotary>,
    pub state: StateAndRef,
}

pub async fn two_party() -> TwoParty {
    init_test_tracing();
    let net = TestNetwork::new();
    let alice = net.create_node("alice");
    let bob = net.create_node("bob");
    let notary_a = net.create_notary("notary-a");
    let notary_b = net.create_notary("notary-b");
    let state = net
        .issue_state(&[&alice, &bob], notary_a.party(), b"100 units")
        .await
        .unwrap();
    TwoParty {
        net,
        alice,
        bob,
        notary_a,
        notary_b,
        state,
    }
}

/// Run a handshake listener on `node` for a single run
pub fn spawn_acceptor<K: ReplacementKind>(
    kind: K,
    node: &Arc<MockNode>,
    config: ReplacementConfig,
) -> JoinHandle<Result<AcceptorOutcome, ProtocolError>> {
    let service = ReplacementService::new(Arc::new(kind), Arc::clone(node), config);
    tokio::spawn(async move { service.accept_next().await })
}

/// Notary change that refuses whatever notary it is offered
pub struct DistrustfulNotaryChange;

#[async_trait]
impl ReplacementKind for DistrustfulNotaryChange {
    type Modification = Party;

    fn name(&self) -> &'static str {
        "distrustful-notary-change"
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
        _proposal: &Proposal<Party>,
        _identity: &dyn IdentityEffects,
    ) -> Result<(), ValidationError> {
        Err(ValidationError::refused("notary not trusted"))
    }
}

/// Receive and decode one envelope addressed to `node`
pub async fn receive_envelope<T: DeserializeOwned>(
    node: &MockNode,
    topic: Topic,
    session_id: SessionId,
) -> WireEnvelope<T> {
    let bytes = node.receive(topic, session_id).await.unwrap();
    WireEnvelope::decode(&bytes, MAX_PAYLOAD).unwrap()
}

/// Send `payload` from `node` to `to` inside an envelope
pub async fn send_envelope<T: Serialize>(
    node: &MockNode,
    to: &Party,
    topic: Topic,
    session_id: SessionId,
    payload: &T,
) {
    let bytes = WireEnvelope::new(session_id, node.party().clone(), payload)
        .encode()
        .unwrap();
    node.send(topic, to, session_id, bytes).await.unwrap();
}
