//! Canonical binary encoding
//!
//! All wire payloads and the canonical transaction bytes use bincode. Enums are
//! encoded with an explicit variant index, so a tagged union can never decode
//! to more than one variant.

use crate::Result;
use serde::{de::DeserializeOwned, Serialize};

/// Serialize any serde-compatible value
pub fn to_vec<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

/// Deserialize any serde-compatible value
pub fn from_slice<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}
