//! Per-participant proposal outcome
//!
//! An acceptor answers a proposal with exactly one [`ReplacementResult`]:
//! its signature, or a structured refusal. The variants cannot be built
//! outside this crate except through [`ReplacementResult::signature`] and
//! [`ReplacementResult::error`].

use replace_core::{DigitalSignature, Party, StateRef};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A participant's refusal to replace a state, carried as data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateReplacementRefused {
    /// Party that refused
    pub identity: Party,
    /// State the proposal would have replaced
    pub state_ref: StateRef,
    /// Human-readable reason
    pub detail: Option<String>,
}

impl StateReplacementRefused {
    pub fn new(identity: Party, state_ref: StateRef, detail: Option<String>) -> Self {
        Self {
            identity,
            state_ref,
            detail,
        }
    }
}

impl fmt::Display for StateReplacementRefused {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} refused to replace {}",
            self.identity, self.state_ref
        )?;
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

/// Wire answer to a proposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplacementResult {
    /// The participant signed the proposed transaction
    #[non_exhaustive]
    Signature(DigitalSignature),
    /// The participant refused
    #[non_exhaustive]
    Error(StateReplacementRefused),
}

impl ReplacementResult {
    /// Approve with a signature over the proposed transaction
    pub fn signature(sig: DigitalSignature) -> Self {
        Self::Signature(sig)
    }

    /// Refuse the proposal
    pub fn error(refusal: StateReplacementRefused) -> Self {
        Self::Error(refusal)
    }

    pub fn is_signature(&self) -> bool {
        matches!(self, Self::Signature(..))
    }

    /// Split into the signature or the refusal
    pub fn into_result(self) -> Result<DigitalSignature, StateReplacementRefused> {
        match self {
            Self::Signature(sig) => Ok(sig),
            Self::Error(refusal) => Err(refusal),
        }
    }
}
