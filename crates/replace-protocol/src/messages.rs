//! Wire messages and session-scoped channel helpers
//!
//! Two topics carry a run's traffic:
//!
//! - [`TOPIC_INITIATE`]: the [`Handshake`] (on [`SessionId::HANDSHAKE`]) and its
//!   [`HandshakeAck`] (on the instigator's receive session)
//! - [`TOPIC_CHANGE`]: the proposal and the [`SignatureSet`] (instigator to
//!   acceptor), and the `ReplacementResult` (acceptor to instigator)
//!
//! Every payload is wrapped in a [`WireEnvelope`]; on receipt the envelope's
//! session and sender are checked against what the run expects.

use crate::{ProtocolError, WaitPoint};
use replace_core::{
    DigitalSignature, Party, PublicKey, ServiceHub, SessionId, Topic, WireEnvelope,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::trace;

/// Topic carrying handshakes
pub const TOPIC_INITIATE: Topic = Topic::new("platform.replace.initiate");

/// Topic carrying proposals, results and signature sets
pub const TOPIC_CHANGE: Topic = Topic::new("platform.replace.change");

/// Opens a run with one acceptor
///
/// Session ids are named from the instigator's point of view: it sends on
/// `send_session_id` and receives on `receive_session_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    /// Session the instigator sends proposal traffic on
    pub send_session_id: SessionId,
    /// Party replies are addressed to
    pub reply_to: Party,
    /// Session the instigator receives replies on
    pub receive_session_id: SessionId,
}

/// Acceptor's confirmation that it is ready for a proposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeAck {
    /// Echo of the handshake's send session, for correlation
    pub send_session_id: SessionId,
}

/// Complete signature set broadcast after notarisation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureSet(pub Vec<DigitalSignature>);

impl SignatureSet {
    pub fn signatures(&self) -> &[DigitalSignature] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check every signature against `content` and that each comes from a
    /// distinct key in `required`
    pub fn verify_all(
        &self,
        content: &[u8],
        required: &BTreeSet<PublicKey>,
    ) -> Result<(), ProtocolError> {
        let mut seen = BTreeSet::new();
        for sig in &self.0 {
            sig.verify(content)
                .map_err(|e| ProtocolError::AggregateVerificationFailed {
                    reason: e.to_string(),
                })?;
            if !required.contains(&sig.by) {
                return Err(ProtocolError::AggregateVerificationFailed {
                    reason: format!("unexpected signature from {}", sig.by.short()),
                });
            }
            if !seen.insert(sig.by) {
                return Err(ProtocolError::AggregateVerificationFailed {
                    reason: format!("duplicate signature from {}", sig.by.short()),
                });
            }
        }
        Ok(())
    }
}

pub(crate) async fn send_payload<H, T>(
    hub: &H,
    topic: Topic,
    destination: &Party,
    session_id: SessionId,
    payload: &T,
) -> Result<(), ProtocolError>
where
    H: ServiceHub + ?Sized,
    T: Serialize + Sync,
{
    let bytes = WireEnvelope::new(session_id, hub.legal_identity(), payload).encode()?;
    trace!(%topic, %session_id, to = %destination, len = bytes.len(), "sending");
    hub.send(topic, destination, session_id, bytes).await?;
    Ok(())
}

/// Receive the next envelope on a session with no bound on the wait
pub(crate) async fn receive_envelope<H, T>(
    hub: &H,
    topic: Topic,
    session_id: SessionId,
    max_len: usize,
) -> Result<WireEnvelope<T>, ProtocolError>
where
    H: ServiceHub + ?Sized,
    T: DeserializeOwned + Send,
{
    let bytes = hub.receive(topic, session_id).await?;
    let envelope: WireEnvelope<T> = WireEnvelope::decode(&bytes, max_len)?;
    if envelope.session_id != session_id {
        return Err(ProtocolError::UnexpectedMessage {
            reason: format!(
                "envelope for {} delivered on {session_id}",
                envelope.session_id
            ),
        });
    }
    Ok(envelope)
}

/// Receive a payload from `from` on a session, bounded by `timeout`
pub(crate) async fn receive_from<H, T>(
    hub: &H,
    topic: Topic,
    session_id: SessionId,
    from: &Party,
    wait_point: WaitPoint,
    timeout: Duration,
    max_len: usize,
) -> Result<T, ProtocolError>
where
    H: ServiceHub + ?Sized,
    T: DeserializeOwned + Send,
{
    let envelope: WireEnvelope<T> =
        match tokio::time::timeout(timeout, receive_envelope(hub, topic, session_id, max_len))
            .await
        {
            Ok(received) => received?,
            Err(_elapsed) => {
                return Err(ProtocolError::Timeout {
                    peer: from.name.clone(),
                    wait_point,
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                })
            }
        };
    if envelope.sender != *from {
        return Err(ProtocolError::UnexpectedMessage {
            reason: format!(
                "{wait_point} on {session_id} came from {} instead of {from}",
                envelope.sender
            ),
        });
    }
    Ok(envelope.payload)
}
