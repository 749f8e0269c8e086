//! Replace Core - ledger model and effect interfaces
//!
//! Foundation types for the state replacement protocol:
//!
//! - **identifiers**: `SessionId`, `StateRef`
//! - **crypto**: Ed25519 `KeyPair`, `PublicKey`, `DigitalSignature`
//! - **transaction**: `WireTransaction`, `SignedTransaction`, `LedgerTransaction`
//! - **messages**: versioned `WireEnvelope` and routing `Topic`
//! - **effects**: capability traits the protocol is parameterized by
//!
//! Nothing here performs I/O; effect traits describe what a host must supply.

#![forbid(unsafe_code)]

pub mod crypto;
pub mod effects;
pub mod errors;
pub mod hash;
pub mod identifiers;
pub mod identity;
pub mod messages;
pub mod serialization;
pub mod transaction;

pub use crypto::{DigitalSignature, KeyPair, LegallyIdentifiableSignature, PublicKey};
pub use effects::{
    IdentityEffects, MessagingEffects, NotaryEffects, ResolutionEffects, ServiceHub,
    SigningEffects, StorageEffects, ValidationEffects,
};
pub use errors::{ReplaceError, Result};
pub use hash::Hash32;
pub use identifiers::{SessionId, StateRef};
pub use identity::Party;
pub use messages::{EnvelopeValidationError, Topic, WireEnvelope, WIRE_FORMAT_VERSION};
pub use transaction::{
    ContractState, LedgerTransaction, SignedTransaction, StateAndRef, TransactionState,
    TransactionType, WireTransaction,
};
