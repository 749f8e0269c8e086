//! Network identities

use crate::PublicKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named network participant and the key it signs with
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Party {
    /// Human-readable legal name, unique within a network
    pub name: String,
    /// Key the party signs transactions with
    pub owning_key: PublicKey,
}

impl Party {
    /// Create a party
    pub fn new(name: impl Into<String>, owning_key: PublicKey) -> Self {
        Self {
            name: name.into(),
            owning_key,
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
