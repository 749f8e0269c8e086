//! Proposal model and the replacement-kind extension point
//!
//! The handshake → propose → collect → notarise → broadcast → finalize flow is
//! written once. What changes between kinds of replacement (new notary, new
//! encumbrance, ...) is how the transaction is built and what an acceptor is
//! willing to sign; that is supplied by a [`ReplacementKind`].

use crate::ValidationError;
use async_trait::async_trait;
use replace_core::{
    IdentityEffects, PublicKey, Result, SignedTransaction, StateAndRef, StateRef, WireTransaction,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt::Debug;

/// Signable description of "replace state X with modification T given tx Y"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal<T> {
    /// State being replaced
    pub state_ref: StateRef,
    /// Requested change
    pub modification: T,
    /// The unsigned transaction every participant is asked to sign
    pub transaction: SignedTransaction,
}

impl<T> Proposal<T> {
    pub fn new(state_ref: StateRef, modification: T, transaction: SignedTransaction) -> Self {
        Self {
            state_ref,
            modification,
            transaction,
        }
    }
}

/// Output of [`ReplacementKind::assemble_tx`]
#[derive(Debug, Clone)]
pub struct AssembledTx {
    /// Transaction bytes with no signatures attached
    pub transaction: SignedTransaction,
    /// Keys that must sign, possibly including the instigator's own
    pub required_signers: Vec<PublicKey>,
}

impl AssembledTx {
    /// Encode `wtx` and take its declared signers as the required set
    pub fn from_wire(wtx: &WireTransaction) -> Result<Self> {
        Ok(Self {
            transaction: wtx.to_signed()?,
            required_signers: wtx.signers.clone(),
        })
    }
}

/// One kind of state replacement
///
/// # Preconditions
///
/// `assemble_tx` decides who is asked to sign. When its required signers
/// reduce to the instigator's own key the run skips peer collection entirely
/// and goes straight to the notary, so an implementation must list every key
/// whose consent the ledger requires.
///
/// The successor state is the assembled transaction's first output.
#[async_trait]
pub trait ReplacementKind: Send + Sync + 'static {
    /// Payload describing the requested change
    type Modification: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Build the unsigned replacement transaction and its required signers
    fn assemble_tx(
        &self,
        original: &StateAndRef,
        modification: &Self::Modification,
        identity: &dyn IdentityEffects,
    ) -> Result<AssembledTx>;

    /// Wrap the assembled transaction for transmission
    fn assemble_proposal(
        &self,
        state_ref: StateRef,
        modification: Self::Modification,
        transaction: SignedTransaction,
    ) -> Proposal<Self::Modification> {
        Proposal::new(state_ref, modification, transaction)
    }

    /// Acceptor-side semantic check of a received proposal
    async fn verify_proposal(
        &self,
        proposal: &Proposal<Self::Modification>,
        identity: &dyn IdentityEffects,
    ) -> std::result::Result<(), ValidationError>;
}
