//! Acceptor role
//!
//! Answers one proposal: verify, then either refuse or sign, then wait for
//! the complete signature set and record the final transaction. Sessions are
//! named from the acceptor's own point of view, so its receive session is the
//! instigator's send session and vice versa.

use crate::messages::{receive_from, send_payload};
use crate::validation::check_proposed_transaction;
use crate::{
    Proposal, ProtocolError, ReplacementConfig, ReplacementKind, ReplacementResult, SignatureSet,
    StateReplacementRefused, ValidationError, WaitPoint, TOPIC_CHANGE,
};
use replace_core::{
    DigitalSignature, LedgerTransaction, Party, ServiceHub, SessionId, SignedTransaction,
};
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Where an acceptor run has got to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptorPhase {
    /// Handshake acknowledged, proposal outstanding
    AwaitingProposal,
    /// Running shared and kind-specific checks
    Verifying,
    /// Signed; waiting for the complete signature set
    Approving,
    /// Final transaction recorded
    Recorded,
    /// Sending a refusal
    Rejecting,
    /// Ended without recording
    Terminated,
}

/// How an acceptor run ended without error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptorOutcome {
    /// The final transaction was verified and recorded
    Recorded {
        /// The fully signed transaction
        transaction: SignedTransaction,
        /// `false` when the store already held it
        newly_recorded: bool,
    },
    /// The proposal was refused and the refusal sent back
    Rejected(StateReplacementRefused),
}

/// Accepting side of a replacement
pub struct Acceptor<K, H> {
    kind: Arc<K>,
    hub: Arc<H>,
    config: ReplacementConfig,
    other_party: Party,
    send_session_id: SessionId,
    receive_session_id: SessionId,
    phase: AcceptorPhase,
}

impl<K, H> std::fmt::Debug for Acceptor<K, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Acceptor")
            .field("config", &self.config)
            .field("other_party", &self.other_party)
            .field("send_session_id", &self.send_session_id)
            .field("receive_session_id", &self.receive_session_id)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl<K, H> Acceptor<K, H>
where
    K: ReplacementKind,
    H: ServiceHub + 'static,
{
    pub fn new(
        kind: Arc<K>,
        hub: Arc<H>,
        config: ReplacementConfig,
        other_party: Party,
        send_session_id: SessionId,
        receive_session_id: SessionId,
    ) -> Self {
        Self {
            kind,
            hub,
            config,
            other_party,
            send_session_id,
            receive_session_id,
            phase: AcceptorPhase::AwaitingProposal,
        }
    }

    pub fn phase(&self) -> AcceptorPhase {
        self.phase
    }

    /// Process the proposal arriving on this acceptor's receive session
    pub async fn run(&mut self) -> Result<AcceptorOutcome, ProtocolError> {
        let span = info_span!(
            "replace",
            role = "acceptor",
            kind = self.kind.name(),
            peer = %self.other_party,
        );
        let outcome = self.drive().instrument(span).await;
        if outcome.is_err() {
            self.phase = AcceptorPhase::Terminated;
        }
        outcome
    }

    async fn drive(&mut self) -> Result<AcceptorOutcome, ProtocolError> {
        let proposal: Proposal<K::Modification> = receive_from(
            &*self.hub,
            TOPIC_CHANGE,
            self.receive_session_id,
            &self.other_party,
            WaitPoint::Proposal,
            self.config.proposal_timeout(),
            self.config.max_payload_bytes,
        )
        .await?;
        debug!(
            state = %proposal.state_ref,
            tx = %proposal.transaction.id(),
            "proposal received"
        );

        self.phase = AcceptorPhase::Verifying;
        let ltx = match self.verify(&proposal).await {
            Ok(ltx) => ltx,
            Err(cause) => return self.reject(&proposal, cause).await,
        };

        self.phase = AcceptorPhase::Approving;
        let own_signature = self.hub.sign(proposal.transaction.tx_bits()).await?;
        send_payload(
            &*self.hub,
            TOPIC_CHANGE,
            &self.other_party,
            self.send_session_id,
            &ReplacementResult::signature(own_signature.clone()),
        )
        .await?;
        info!(state = %proposal.state_ref, "proposal approved");

        let set: SignatureSet = receive_from(
            &*self.hub,
            TOPIC_CHANGE,
            self.receive_session_id,
            &self.other_party,
            WaitPoint::SignatureSet,
            self.config.signature_set_timeout(),
            self.config.max_payload_bytes,
        )
        .await?;

        let final_tx = self.finalize(&proposal, &ltx, own_signature, set).await?;
        let newly_recorded = self.hub.record(&final_tx).await?;
        self.phase = AcceptorPhase::Recorded;
        info!(
            tx = %final_tx.id(),
            signatures = final_tx.sigs().len(),
            newly_recorded,
            "replacement recorded"
        );
        Ok(AcceptorOutcome::Recorded {
            transaction: final_tx,
            newly_recorded,
        })
    }

    async fn verify(
        &self,
        proposal: &Proposal<K::Modification>,
    ) -> Result<LedgerTransaction, ValidationError> {
        self.kind.verify_proposal(proposal, &*self.hub).await?;
        check_proposed_transaction(
            &*self.hub,
            &proposal.state_ref,
            &proposal.transaction,
            &self.other_party,
            &self.config,
        )
        .await
    }

    async fn reject(
        &mut self,
        proposal: &Proposal<K::Modification>,
        cause: ValidationError,
    ) -> Result<AcceptorOutcome, ProtocolError> {
        self.phase = AcceptorPhase::Rejecting;
        warn!(state = %proposal.state_ref, reason = %cause, "refusing proposal");
        let refusal = StateReplacementRefused::new(
            self.hub.legal_identity(),
            proposal.state_ref,
            Some(cause.to_string()),
        );
        send_payload(
            &*self.hub,
            TOPIC_CHANGE,
            &self.other_party,
            self.send_session_id,
            &ReplacementResult::error(refusal.clone()),
        )
        .await?;
        self.phase = AcceptorPhase::Terminated;
        Ok(AcceptorOutcome::Rejected(refusal))
    }

    /// Combine the broadcast set with the proposal and re-verify everything
    async fn finalize(
        &self,
        proposal: &Proposal<K::Modification>,
        ltx: &LedgerTransaction,
        own_signature: DigitalSignature,
        set: SignatureSet,
    ) -> Result<SignedTransaction, ProtocolError> {
        let tx_bits = proposal.transaction.tx_bits();
        if let Err(e) = set.verify_all(tx_bits, &ltx.required_signing_keys()) {
            error!(error = %e, "broadcast signature set does not verify");
            return Err(e);
        }
        let final_tx = proposal
            .transaction
            .with_additional_signatures(set.0.into_iter().chain([own_signature]));
        final_tx.verify_signatures().map_err(|e| {
            error!(error = %e, "final transaction is missing signatures");
            ProtocolError::AggregateVerificationFailed {
                reason: e.to_string(),
            }
        })?;
        self.hub
            .verify_transaction(ltx)
            .await
            .map_err(|e| ProtocolError::InvalidTransaction {
                reason: e.to_string(),
            })?;
        Ok(final_tx)
    }
}
