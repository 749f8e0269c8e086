//! Per-participant session records
//!
//! Each run keeps one [`PeerSession`] per contacted participant. Records are
//! owned by the run and dropped with it; there is no shared session table.

use crate::Handshake;
use replace_core::{DigitalSignature, Party, PublicKey, SessionId};

/// Progress of one participant within a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerOutcome {
    /// Handshake sent, acknowledgement outstanding
    AwaitingHandshake,
    /// Proposal sent, result outstanding
    AwaitingResult,
    /// Participant returned a verified signature
    Signed(DigitalSignature),
}

/// Session state held by the instigator for one participant
#[derive(Debug, Clone)]
pub struct PeerSession {
    /// The participant
    pub party: Party,
    /// Required signing key this participant was resolved from
    pub required_key: PublicKey,
    /// Session the instigator sends on
    pub send_session_id: SessionId,
    /// Session the instigator receives on
    pub receive_session_id: SessionId,
    /// Where this participant has got to
    pub outcome: PeerOutcome,
}

impl PeerSession {
    /// Mint a fresh session pair for `party`, signing for `required_key`
    pub fn open(party: Party, required_key: PublicKey) -> Self {
        Self {
            party,
            required_key,
            send_session_id: SessionId::random(),
            receive_session_id: SessionId::random(),
            outcome: PeerOutcome::AwaitingHandshake,
        }
    }

    /// Handshake announcing this session pair, replying to `local`
    pub fn handshake(&self, local: Party) -> Handshake {
        Handshake {
            send_session_id: self.send_session_id,
            reply_to: local,
            receive_session_id: self.receive_session_id,
        }
    }

    /// The verified signature, once collected
    pub fn signature(&self) -> Option<&DigitalSignature> {
        match &self.outcome {
            PeerOutcome::Signed(sig) => Some(sig),
            _ => None,
        }
    }
}
