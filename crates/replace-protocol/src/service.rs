//! Handshake listener
//!
//! A node that may be asked to replace a state runs a [`ReplacementService`].
//! Each handshake arriving on [`TOPIC_INITIATE`] is acknowledged and turned
//! into an [`Acceptor`] bound to the session pair it announced.

use crate::messages::{receive_envelope, send_payload};
use crate::{
    Acceptor, AcceptorOutcome, Handshake, HandshakeAck, ProtocolError, ReplacementConfig,
    ReplacementKind, TOPIC_INITIATE,
};
use replace_core::{ServiceHub, SessionId};
use std::sync::Arc;
use tracing::debug;

/// Accepts replacement handshakes for one kind
pub struct ReplacementService<K, H> {
    kind: Arc<K>,
    hub: Arc<H>,
    config: ReplacementConfig,
}

impl<K, H> ReplacementService<K, H>
where
    K: ReplacementKind,
    H: ServiceHub + 'static,
{
    pub fn new(kind: Arc<K>, hub: Arc<H>, config: ReplacementConfig) -> Self {
        Self { kind, hub, config }
    }

    /// Wait for the next handshake and acknowledge it
    ///
    /// Waits without bound; hosts decide how long a node listens.
    pub async fn next_handshake(&self) -> Result<Acceptor<K, H>, ProtocolError> {
        let envelope = receive_envelope::<_, Handshake>(
            &*self.hub,
            TOPIC_INITIATE,
            SessionId::HANDSHAKE,
            self.config.max_payload_bytes,
        )
        .await?;
        let handshake = envelope.payload;
        if envelope.sender != handshake.reply_to {
            return Err(ProtocolError::UnexpectedMessage {
                reason: format!(
                    "handshake from {} asks for replies to {}",
                    envelope.sender, handshake.reply_to
                ),
            });
        }
        if handshake.send_session_id == handshake.receive_session_id {
            return Err(ProtocolError::UnexpectedMessage {
                reason: format!(
                    "handshake from {} reuses {} for both directions",
                    handshake.reply_to, handshake.send_session_id
                ),
            });
        }
        debug!(from = %handshake.reply_to, session = %handshake.send_session_id, "handshake received");

        send_payload(
            &*self.hub,
            TOPIC_INITIATE,
            &handshake.reply_to,
            handshake.receive_session_id,
            &HandshakeAck {
                send_session_id: handshake.send_session_id,
            },
        )
        .await?;

        Ok(Acceptor::new(
            Arc::clone(&self.kind),
            Arc::clone(&self.hub),
            self.config.clone(),
            handshake.reply_to,
            handshake.receive_session_id,
            handshake.send_session_id,
        ))
    }

    /// Handle the next handshake to completion
    pub async fn accept_next(&self) -> Result<AcceptorOutcome, ProtocolError> {
        let mut acceptor = self.next_handshake().await?;
        acceptor.run().await
    }
}
