//! Identifier types shared by every replacement run

use crate::Hash32;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Per-direction correlation token scoping messages between two parties
///
/// A fresh pair is minted for every peer in every run. Ids are drawn from the
/// process random source (UUID v4), so a collision inside a run's lifetime is
/// not a practical concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Well-known session on which handshakes are delivered
    pub const HANDSHAKE: Self = Self(Uuid::nil());

    /// Create a new random session ID
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Reference to one output of a recorded transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateRef {
    /// Id of the transaction that produced the state
    pub txhash: Hash32,
    /// Output index within that transaction
    pub index: u32,
}

impl StateRef {
    /// Create a state reference
    pub fn new(txhash: Hash32, index: u32) -> Self {
        Self { txhash, index }
    }
}

impl fmt::Display for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.txhash, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_sessions_are_distinct() {
        let ids: std::collections::HashSet<_> = (0..256).map(|_| SessionId::random()).collect();
        assert_eq!(ids.len(), 256);
        assert!(!ids.contains(&SessionId::HANDSHAKE));
    }

    #[test]
    fn test_state_ref_display() {
        let state_ref = StateRef::new(Hash32::ZERO, 3);
        assert!(state_ref.to_string().ends_with("(3)"));
    }
}
