//! Notary change
//!
//! Moves a state from its current notary to another one without touching its
//! data. Every participant of the state must consent, and the old notary
//! notarises the change since it controls the input.

use crate::{AssembledTx, Proposal, ReplacementKind, ValidationError};
use async_trait::async_trait;
use replace_core::{
    IdentityEffects, Party, ReplaceError, Result, StateAndRef, TransactionType, WireTransaction,
};

/// Replacement kind re-pointing a state at a new notary
#[derive(Debug, Clone, Copy, Default)]
pub struct NotaryChange;

#[async_trait]
impl ReplacementKind for NotaryChange {
    type Modification = Party;

    fn name(&self) -> &'static str {
        "notary-change"
    }

    fn assemble_tx(
        &self,
        original: &StateAndRef,
        new_notary: &Party,
        _identity: &dyn IdentityEffects,
    ) -> Result<AssembledTx> {
        if original.state.notary == *new_notary {
            return Err(ReplaceError::invalid(format!(
                "{} is already controlled by {new_notary}",
                original.state_ref
            )));
        }
        let wtx = WireTransaction {
            inputs: vec![original.state_ref],
            outputs: vec![original.state.with_notary(new_notary.clone())],
            signers: original.state.data.participants.clone(),
            notary: Some(original.state.notary.clone()),
            tx_type: TransactionType::NotaryChange,
        };
        AssembledTx::from_wire(&wtx)
    }

    async fn verify_proposal(
        &self,
        proposal: &Proposal<Party>,
        identity: &dyn IdentityEffects,
    ) -> std::result::Result<(), ValidationError> {
        let new_notary = &proposal.modification;
        if !identity.is_notary(new_notary) {
            return Err(ValidationError::refused(format!(
                "The proposed node {new_notary} does not run a Notary service"
            )));
        }

        let wtx = proposal
            .transaction
            .tx()
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;
        if wtx.tx_type != TransactionType::NotaryChange {
            return Err(ValidationError::refused(
                "proposed transaction is not a notary change",
            ));
        }
        if !wtx.inputs.contains(&proposal.state_ref) {
            return Err(ValidationError::StateNotConsumed(proposal.state_ref));
        }
        if let Some(output) = wtx.outputs.iter().find(|output| output.notary != *new_notary) {
            return Err(ValidationError::refused(format!(
                "output is assigned to {} instead of the proposed notary {new_notary}",
                output.notary
            )));
        }
        Ok(())
    }
}
