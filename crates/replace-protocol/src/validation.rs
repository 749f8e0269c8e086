//! Acceptor-side proposal validation
//!
//! [`check_proposed_transaction`] runs the checks every kind shares: the local
//! node is asked to sign, the named state is consumed, dependencies resolve
//! and the ledger rules pass. Kind-specific checks live in
//! [`ReplacementKind::verify_proposal`](crate::ReplacementKind::verify_proposal).
//!
//! Every failure here becomes a refusal on the wire; none is a hard error.

use crate::ReplacementConfig;
use replace_core::{
    Hash32, LedgerTransaction, Party, ServiceHub, SignedTransaction, StateAndRef, StateRef,
};
use tracing::debug;

/// Why an acceptor declines to sign
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Kind-specific refusal; the message is sent back verbatim
    #[error("{0}")]
    Refused(String),

    /// The local node's key is not among the required signers
    #[error("not a required signer: {0}")]
    NotRequiredSigner(String),

    /// The proposed transaction does not consume the named state
    #[error("transaction does not consume {0}")]
    StateNotConsumed(StateRef),

    /// Dependencies could not be fetched or loaded
    #[error("dependency resolution failed: {0}")]
    DependencyError(String),

    /// The ledger rule engine rejected the transaction
    #[error("ledger rules violated: {0}")]
    RuleViolation(String),

    /// A signature already attached to the proposal is invalid
    #[error("attached signature invalid: {0}")]
    SignatureMismatch(String),

    /// The proposal could not be decoded or is structurally wrong
    #[error("malformed proposal: {0}")]
    Malformed(String),
}

impl ValidationError {
    /// Kind-specific refusal with a human-readable reason
    pub fn refused(reason: impl Into<String>) -> Self {
        Self::Refused(reason.into())
    }
}

/// Shared checks run before an acceptor signs
///
/// Dependencies are fetched from `other_party`, bounded by the configured
/// resolution timeout.
pub async fn check_proposed_transaction<H>(
    hub: &H,
    state_ref: &StateRef,
    stx: &SignedTransaction,
    other_party: &Party,
    config: &ReplacementConfig,
) -> Result<LedgerTransaction, ValidationError>
where
    H: ServiceHub + ?Sized,
{
    let wtx = stx
        .tx()
        .map_err(|e| ValidationError::Malformed(e.to_string()))?;

    let me = hub.legal_identity();
    if !wtx.signers.contains(&me.owning_key) {
        return Err(ValidationError::NotRequiredSigner(me.name));
    }
    if !wtx.inputs.contains(state_ref) {
        return Err(ValidationError::StateNotConsumed(*state_ref));
    }
    for sig in stx.sigs() {
        sig.verify(stx.tx_bits())
            .map_err(|e| ValidationError::SignatureMismatch(e.to_string()))?;
    }

    let dependencies: Vec<Hash32> = wtx.inputs.iter().map(|input| input.txhash).collect();
    debug!(count = dependencies.len(), from = %other_party, "resolving dependencies");
    match tokio::time::timeout(
        config.resolution_timeout(),
        hub.resolve(&dependencies, other_party),
    )
    .await
    {
        Ok(resolved) => resolved.map_err(|e| ValidationError::DependencyError(e.to_string()))?,
        Err(_elapsed) => {
            return Err(ValidationError::DependencyError(format!(
                "{other_party} did not supply dependencies within {}ms",
                config.resolution_timeout_ms
            )))
        }
    }

    let mut inputs = Vec::with_capacity(wtx.inputs.len());
    for input in &wtx.inputs {
        let state = hub
            .load_state(input)
            .await
            .map_err(|e| ValidationError::DependencyError(e.to_string()))?;
        inputs.push(StateAndRef {
            state,
            state_ref: *input,
        });
    }
    let ltx = wtx
        .resolve(stx.id(), inputs)
        .map_err(|e| ValidationError::Malformed(e.to_string()))?;

    hub.verify_transaction(&ltx)
        .await
        .map_err(|e| ValidationError::RuleViolation(e.to_string()))?;
    Ok(ltx)
}
