//! Versioned wire envelope
//!
//! Every protocol payload travels inside a [`WireEnvelope`] that records the
//! format version, the session it belongs to and the sending party.

use crate::{serialization, Party, ReplaceError, Result, SessionId};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;

/// Current wire format version
pub const WIRE_FORMAT_VERSION: u16 = 1;

/// Logical message topic used to route traffic between protocol roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic(&'static str);

impl Topic {
    /// Create a topic from a static name
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// Topic name
    pub const fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Envelope wrapping a single protocol payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireEnvelope<T> {
    /// Message format version
    pub version: u16,
    /// Session this message belongs to
    pub session_id: SessionId,
    /// Party that sent the message
    pub sender: Party,
    /// The actual message payload
    pub payload: T,
}

impl<T> WireEnvelope<T> {
    /// Create an envelope at the current format version
    #[must_use]
    pub fn new(session_id: SessionId, sender: Party, payload: T) -> Self {
        Self {
            version: WIRE_FORMAT_VERSION,
            session_id,
            sender,
            payload,
        }
    }

    /// Validate envelope invariants after deserialization
    pub fn validate(&self) -> std::result::Result<(), EnvelopeValidationError> {
        if self.version == 0 {
            return Err(EnvelopeValidationError::InvalidVersion(self.version));
        }
        if self.version > WIRE_FORMAT_VERSION {
            return Err(EnvelopeValidationError::UnsupportedVersion {
                received: self.version,
                max_supported: WIRE_FORMAT_VERSION,
            });
        }
        Ok(())
    }
}

impl<T: Serialize> WireEnvelope<T> {
    /// Encode for transmission
    pub fn encode(&self) -> Result<Vec<u8>> {
        serialization::to_vec(self)
    }
}

impl<T: DeserializeOwned> WireEnvelope<T> {
    /// Decode and validate a received envelope
    pub fn decode(bytes: &[u8], max_len: usize) -> Result<Self> {
        if bytes.len() > max_len {
            return Err(EnvelopeValidationError::TooLarge {
                len: bytes.len(),
                max_len,
            }
            .into());
        }
        let envelope: Self = serialization::from_slice(bytes)?;
        envelope.validate()?;
        Ok(envelope)
    }
}

/// Errors that can occur during envelope validation
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EnvelopeValidationError {
    /// Version zero is never produced by a valid sender
    #[error("Invalid version: {0}")]
    InvalidVersion(u16),

    /// Sender speaks a newer format than this node understands
    #[error("Unsupported version {received}, max supported is {max_supported}")]
    UnsupportedVersion {
        /// Version found in the envelope
        received: u16,
        /// Highest version this node decodes
        max_supported: u16,
    },

    /// Encoded envelope exceeds the configured limit
    #[error("Envelope of {len} bytes exceeds limit of {max_len}")]
    TooLarge {
        /// Received size
        len: usize,
        /// Configured maximum
        max_len: usize,
    },
}

impl From<EnvelopeValidationError> for ReplaceError {
    fn from(err: EnvelopeValidationError) -> Self {
        ReplaceError::invalid(err.to_string())
    }
}
