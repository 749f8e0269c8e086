//! # Replace Protocol - state replacement agreement
//!
//! Replaces a ledger state shared by several parties with a successor that
//! every participant has signed and the controlling notary has notarised.
//!
//! ## Roles
//!
//! - **Instigator**: assembles the replacement transaction, collects signatures
//!   concurrently, obtains the notary signature, broadcasts the complete set
//!   and records the result
//! - **Acceptor**: verifies a proposal, signs or refuses, then re-verifies the
//!   broadcast set before recording
//! - **ReplacementService**: acceptor-side handshake listener
//!
//! ## Extension
//!
//! The flow is generic over a [`ReplacementKind`], which decides how the
//! transaction is built and what an acceptor agrees to. [`NotaryChange`] is the
//! built-in kind.
//!
//! ## Design Principles
//!
//! - Every effect (messaging, notary, storage, signing) comes from a
//!   [`replace_core::ServiceHub`]
//! - Every wait is bounded by [`ReplacementConfig`]
//! - Refusals and timeouts are data; forged or inconsistent signatures are errors
//! - Nothing is recorded unless the run completes

#![allow(missing_docs)]
#![forbid(unsafe_code)]

/// Acceptor role and its phases
pub mod acceptor;

/// Concurrent per-participant signature collection
pub mod collector;

/// Runtime timeouts and limits
pub mod config;

/// Protocol error taxonomy
pub mod errors;

/// Instigator role
pub mod instigator;

/// Wire messages and topics
pub mod messages;

/// Built-in notary change kind
pub mod notary_change;

/// Proposal result and refusal
pub mod outcome;

/// Proposal and replacement kind trait
pub mod proposal;

/// Handshake listener
pub mod service;

/// Per-participant session records
pub mod session;

/// Shared acceptor-side checks
pub mod validation;

pub use acceptor::{Acceptor, AcceptorOutcome, AcceptorPhase};
pub use collector::SignatureCollector;
pub use config::{ReplacementConfig, ENV_PREFIX};
pub use errors::{ProtocolError, RejectionOrigin, WaitPoint};
pub use instigator::{Instigator, ReplacementReport};
pub use messages::{Handshake, HandshakeAck, SignatureSet, TOPIC_CHANGE, TOPIC_INITIATE};
pub use notary_change::NotaryChange;
pub use outcome::{ReplacementResult, StateReplacementRefused};
pub use proposal::{AssembledTx, Proposal, ReplacementKind};
pub use service::ReplacementService;
pub use session::{PeerOutcome, PeerSession};
pub use validation::{check_proposed_transaction, ValidationError};
