//! Protocol error taxonomy
//!
//! Rejections are recoverable data (a participant declined, or never
//! answered). Signature forgery, aggregate verification failure and unknown
//! participants are hard failures and are kept as separate variants so they
//! are never mistaken for a business decision.

use crate::StateReplacementRefused;
use replace_core::{PublicKey, ReplaceError};
use std::fmt;

/// Why a run ended in rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionOrigin {
    /// The participant answered with an explicit refusal
    Refused,
    /// The participant did not answer within the configured bound
    TimedOut,
}

impl fmt::Display for RejectionOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionOrigin::Refused => write!(f, "refused"),
            RejectionOrigin::TimedOut => write!(f, "timeout"),
        }
    }
}

/// Suspension point a timeout occurred at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPoint {
    HandshakeAck,
    Proposal,
    ProposalResult,
    SignatureSet,
    Notarisation,
    Resolution,
}

impl fmt::Display for WaitPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WaitPoint::HandshakeAck => "handshake acknowledgement",
            WaitPoint::Proposal => "proposal",
            WaitPoint::ProposalResult => "proposal result",
            WaitPoint::SignatureSet => "signature set",
            WaitPoint::Notarisation => "notary signature",
            WaitPoint::Resolution => "dependency resolution",
        };
        f.write_str(name)
    }
}

/// Failure of a replacement run
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A participant refused or timed out; nothing was recorded
    #[error("state replacement rejected ({origin}): {refusal}")]
    StateReplacementRejected {
        /// The refusal, synthesized locally for timeouts
        refusal: StateReplacementRefused,
        /// Whether the participant refused or went silent
        origin: RejectionOrigin,
    },

    /// A participant's signature is not by its key or not over the proposed bytes
    #[error("signature from {party} failed validation: {reason}")]
    SignatureValidationFailed {
        /// Participant whose signature failed
        party: String,
        /// What was wrong with it
        reason: String,
    },

    /// The broadcast signature set does not verify against the transaction
    #[error("aggregate signature verification failed: {reason}")]
    AggregateVerificationFailed {
        /// What failed to verify
        reason: String,
    },

    /// A required signer key has no network identity
    #[error("no network identity for participant key {}", .key.short())]
    UnknownParticipant {
        /// The unresolvable key
        key: PublicKey,
    },

    /// A peer did not answer within the configured bound
    #[error("{peer} did not respond within {timeout_ms}ms while awaiting {wait_point}")]
    Timeout {
        /// Peer being waited on
        peer: String,
        /// Where the run was suspended
        wait_point: WaitPoint,
        /// Bound that elapsed
        timeout_ms: u64,
    },

    /// The notary refused or returned an unusable signature
    #[error("notarisation failed: {reason}")]
    Notarisation {
        /// Reason reported or detected
        reason: String,
    },

    /// A message arrived that does not belong to this run
    #[error("unexpected message: {reason}")]
    UnexpectedMessage {
        /// What did not match
        reason: String,
    },

    /// The finalized transaction failed ledger verification
    #[error("finalized transaction is invalid: {reason}")]
    InvalidTransaction {
        /// Rule engine output
        reason: String,
    },

    /// Invalid runtime configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Failure reported by an effect
    #[error(transparent)]
    Core(#[from] ReplaceError),
}

impl ProtocolError {
    /// A participant declined or went silent
    pub fn is_rejection(&self) -> bool {
        matches!(self, ProtocolError::StateReplacementRejected { .. })
    }

    /// The run was abandoned because a bound elapsed
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ProtocolError::Timeout { .. }
                | ProtocolError::StateReplacementRejected {
                    origin: RejectionOrigin::TimedOut,
                    ..
                }
        )
    }

    /// Signature forgery or corruption was detected
    pub fn is_signature_failure(&self) -> bool {
        matches!(
            self,
            ProtocolError::SignatureValidationFailed { .. }
                | ProtocolError::AggregateVerificationFailed { .. }
        )
    }

    /// The refusal carried by a rejection
    pub fn refusal(&self) -> Option<&StateReplacementRefused> {
        match self {
            ProtocolError::StateReplacementRejected { refusal, .. } => Some(refusal),
            _ => None,
        }
    }
}
