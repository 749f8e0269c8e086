//! Concurrent signature collection
//!
//! One exchange runs per participant: handshake, wait for the acknowledgement,
//! send the proposal, wait for the result. Exchanges run concurrently; the
//! first refusal, timeout or bad signature abandons the others.

use crate::messages::{receive_from, send_payload};
use crate::{
    Handshake, HandshakeAck, PeerOutcome, PeerSession, ProtocolError, Proposal, RejectionOrigin,
    ReplacementConfig, ReplacementResult, StateReplacementRefused, WaitPoint, TOPIC_CHANGE,
    TOPIC_INITIATE,
};
use futures::future::try_join_all;
use replace_core::{DigitalSignature, Party, PublicKey, ServiceHub, SessionId};
use serde::Serialize;
use tracing::{debug, error, info, warn};

/// Gathers participant signatures over a proposed transaction
pub struct SignatureCollector<'a, H: ?Sized> {
    hub: &'a H,
    config: &'a ReplacementConfig,
}

impl<'a, H> SignatureCollector<'a, H>
where
    H: ServiceHub + ?Sized,
{
    pub fn new(hub: &'a H, config: &'a ReplacementConfig) -> Self {
        Self { hub, config }
    }

    /// Run every exchange concurrently
    ///
    /// On success every returned session is [`PeerOutcome::Signed`] with a
    /// signature verified against that participant's key and the proposal's
    /// transaction bytes.
    pub async fn collect<T>(
        &self,
        sessions: Vec<PeerSession>,
        proposal: &Proposal<T>,
    ) -> Result<Vec<PeerSession>, ProtocolError>
    where
        T: Serialize + Sync,
    {
        let local = self.hub.legal_identity();
        try_join_all(
            sessions
                .into_iter()
                .map(|session| self.exchange(&local, session, proposal)),
        )
        .await
    }

    async fn exchange<T>(
        &self,
        local: &Party,
        mut session: PeerSession,
        proposal: &Proposal<T>,
    ) -> Result<PeerSession, ProtocolError>
    where
        T: Serialize + Sync,
    {
        let peer = session.party.clone();
        let max_len = self.config.max_payload_bytes;

        let handshake = session.handshake(local.clone());
        send_payload(
            self.hub,
            TOPIC_INITIATE,
            &peer,
            SessionId::HANDSHAKE,
            &handshake,
        )
        .await?;
        debug!(peer = %peer, session = %session.send_session_id, "handshake sent");

        let ack: HandshakeAck = receive_from(
            self.hub,
            TOPIC_INITIATE,
            session.receive_session_id,
            &peer,
            WaitPoint::HandshakeAck,
            self.config.handshake_timeout(),
            max_len,
        )
        .await
        .map_err(|e| self.timeout_as_rejection(e, &peer, proposal))?;
        check_ack(&handshake, &ack)?;

        send_payload(
            self.hub,
            TOPIC_CHANGE,
            &peer,
            session.send_session_id,
            proposal,
        )
        .await?;
        session.outcome = PeerOutcome::AwaitingResult;

        let result: ReplacementResult = receive_from(
            self.hub,
            TOPIC_CHANGE,
            session.receive_session_id,
            &peer,
            WaitPoint::ProposalResult,
            self.config.proposal_timeout(),
            max_len,
        )
        .await
        .map_err(|e| self.timeout_as_rejection(e, &peer, proposal))?;

        match result.into_result() {
            Ok(sig) => {
                verify_participant_signature(&sig, &peer, &session.required_key, proposal)?;
                info!(peer = %peer, "participant signed");
                session.outcome = PeerOutcome::Signed(sig);
                Ok(session)
            }
            Err(refusal) => {
                warn!(
                    peer = %peer,
                    reason = "refused",
                    detail = refusal.detail.as_deref().unwrap_or(""),
                    "participant rejected replacement"
                );
                Err(ProtocolError::StateReplacementRejected {
                    refusal,
                    origin: RejectionOrigin::Refused,
                })
            }
        }
    }

    fn timeout_as_rejection<T>(
        &self,
        error: ProtocolError,
        peer: &Party,
        proposal: &Proposal<T>,
    ) -> ProtocolError {
        match error {
            ProtocolError::Timeout {
                wait_point,
                timeout_ms,
                ..
            } => {
                warn!(
                    peer = %peer,
                    reason = "timeout",
                    %wait_point,
                    timeout_ms,
                    "participant rejected replacement"
                );
                ProtocolError::StateReplacementRejected {
                    refusal: StateReplacementRefused::new(
                        peer.clone(),
                        proposal.state_ref,
                        Some(format!("no {wait_point} within {timeout_ms}ms")),
                    ),
                    origin: RejectionOrigin::TimedOut,
                }
            }
            other => other,
        }
    }
}

fn check_ack(handshake: &Handshake, ack: &HandshakeAck) -> Result<(), ProtocolError> {
    if ack.send_session_id != handshake.send_session_id {
        return Err(ProtocolError::UnexpectedMessage {
            reason: format!(
                "acknowledgement for {} received while opening {}",
                ack.send_session_id, handshake.send_session_id
            ),
        });
    }
    Ok(())
}

/// A returned signature must be by the required key the participant was
/// contacted for and over the proposed bytes
fn verify_participant_signature<T>(
    sig: &DigitalSignature,
    peer: &Party,
    required_key: &PublicKey,
    proposal: &Proposal<T>,
) -> Result<(), ProtocolError> {
    sig.verify_with_key(proposal.transaction.tx_bits(), required_key)
        .map_err(|e| {
            error!(peer = %peer, error = %e, "participant returned an invalid signature");
            ProtocolError::SignatureValidationFailed {
                party: peer.name.clone(),
                reason: e.to_string(),
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use replace_core::{Hash32, KeyPair, StateRef, TransactionType, WireTransaction};

    fn proposal() -> Proposal<()> {
        let wtx = WireTransaction {
            inputs: vec![StateRef::new(Hash32::of(b"issue"), 0)],
            outputs: vec![],
            signers: vec![KeyPair::from_label("bob").public()],
            notary: None,
            tx_type: TransactionType::General,
        };
        Proposal::new(
            StateRef::new(Hash32::of(b"issue"), 0),
            (),
            wtx.to_signed().unwrap(),
        )
    }

    #[test]
    fn test_participant_signature_checks_key_and_bytes() {
        let bob_keys = KeyPair::from_label("bob");
        let bob = Party::new("bob", bob_keys.public());
        let proposal = proposal();

        let good = bob_keys.sign(proposal.transaction.tx_bits());
        assert!(verify_participant_signature(&good, &bob, &bob.owning_key, &proposal).is_ok());

        let other_bytes = bob_keys.sign(b"different transaction");
        assert_matches!(
            verify_participant_signature(&other_bytes, &bob, &bob.owning_key, &proposal),
            Err(ProtocolError::SignatureValidationFailed { party, .. }) if party == "bob"
        );

        let wrong_key = KeyPair::from_label("mallory").sign(proposal.transaction.tx_bits());
        assert_matches!(
            verify_participant_signature(&wrong_key, &bob, &bob.owning_key, &proposal),
            Err(ProtocolError::SignatureValidationFailed { .. })
        );
    }

    #[test]
    fn test_participant_signature_checked_against_required_key() {
        let proposal = proposal();
        let required = KeyPair::from_label("bob").public();
        // Directory maps the required key to a party owning a different key.
        let mallory_keys = KeyPair::from_label("mallory");
        let redirected = Party::new("bob", mallory_keys.public());
        let sig = mallory_keys.sign(proposal.transaction.tx_bits());
        assert_matches!(
            verify_participant_signature(&sig, &redirected, &required, &proposal),
            Err(ProtocolError::SignatureValidationFailed { party, .. }) if party == "bob"
        );
    }

    #[test]
    fn test_ack_must_echo_session() {
        let alice = Party::new("alice", KeyPair::from_label("alice").public());
        let key = KeyPair::from_label("bob").public();
        let session = PeerSession::open(Party::new("bob", key), key);
        let handshake = session.handshake(alice);
        let echoed = HandshakeAck {
            send_session_id: handshake.send_session_id,
        };
        assert!(check_ack(&handshake, &echoed).is_ok());

        let stale = HandshakeAck {
            send_session_id: SessionId::random(),
        };
        assert_matches!(
            check_ack(&handshake, &stale),
            Err(ProtocolError::UnexpectedMessage { .. })
        );
    }
}
