//! Instigator role
//!
//! Drives one replacement from assembly to a recorded, notarised transaction:
//!
//! 1. assemble the transaction and, if required, sign it locally
//! 2. resolve every other required signer to a network identity
//! 3. collect participant signatures (skipped when only the local key is required)
//! 4. obtain the notary's signature
//! 5. broadcast the complete signature set to every participant
//! 6. verify and record the final transaction
//!
//! Nothing is recorded unless every step succeeds.

use crate::messages::send_payload;
use crate::{
    PeerSession, ProtocolError, ReplacementConfig, ReplacementKind, SignatureCollector,
    SignatureSet, WaitPoint, TOPIC_CHANGE,
};
use futures::future::join_all;
use replace_core::{
    DigitalSignature, LegallyIdentifiableSignature, Party, PublicKey, ServiceHub,
    SignedTransaction, StateAndRef, WireTransaction,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

/// What a completed run produced
#[derive(Debug, Clone)]
pub struct ReplacementReport {
    /// The state that replaces the original
    pub successor: StateAndRef,
    /// The recorded transaction with every signature attached
    pub transaction: SignedTransaction,
    /// Signatures gathered from other parties: participants, then the notary
    pub collected: Vec<DigitalSignature>,
}

/// Instigating side of a replacement
pub struct Instigator<K, H> {
    kind: Arc<K>,
    hub: Arc<H>,
    config: ReplacementConfig,
}

impl<K, H> Instigator<K, H>
where
    K: ReplacementKind,
    H: ServiceHub + 'static,
{
    pub fn new(kind: Arc<K>, hub: Arc<H>, config: ReplacementConfig) -> Self {
        Self { kind, hub, config }
    }

    /// Replace `original` according to `modification`
    ///
    /// Returns the successor state once the replacement transaction is
    /// notarised and recorded.
    pub async fn run(
        &self,
        original: StateAndRef,
        modification: K::Modification,
    ) -> Result<StateAndRef, ProtocolError> {
        Ok(self.run_with_report(original, modification).await?.successor)
    }

    /// As [`Self::run`], also returning the recorded transaction
    pub async fn run_with_report(
        &self,
        original: StateAndRef,
        modification: K::Modification,
    ) -> Result<ReplacementReport, ProtocolError> {
        let span = info_span!(
            "replace",
            role = "instigator",
            kind = self.kind.name(),
            state = %original.state_ref,
        );
        self.drive(original, modification).instrument(span).await
    }

    async fn drive(
        &self,
        original: StateAndRef,
        modification: K::Modification,
    ) -> Result<ReplacementReport, ProtocolError> {
        let hub = &*self.hub;
        let me = hub.legal_identity();
        let state_ref = original.state_ref;

        let assembled = self.kind.assemble_tx(&original, &modification, hub)?;
        let unsigned = assembled.transaction;
        let wtx = unsigned.tx()?;
        let notary = wtx
            .notary
            .clone()
            .ok_or_else(|| ProtocolError::InvalidTransaction {
                reason: "replacement transaction names no notary".to_string(),
            })?;

        let required: BTreeSet<PublicKey> = assembled.required_signers.into_iter().collect();
        let own_signature = if required.contains(&me.owning_key) {
            Some(hub.sign(unsigned.tx_bits()).await?)
        } else {
            None
        };
        let sessions = required
            .iter()
            .filter(|key| **key != me.owning_key)
            .map(|key| {
                hub.party_from_key(key)
                    .map(|party| PeerSession::open(party, *key))
                    .ok_or(ProtocolError::UnknownParticipant { key: *key })
            })
            .collect::<Result<Vec<_>, _>>()?;
        info!(
            tx = %unsigned.id(),
            participants = sessions.len(),
            "replacement transaction assembled"
        );

        let proposal = self
            .kind
            .assemble_proposal(state_ref, modification, unsigned.clone());
        let sessions = if sessions.is_empty() {
            debug!("only the local key is required; skipping signature collection");
            sessions
        } else {
            SignatureCollector::new(hub, &self.config)
                .collect(sessions, &proposal)
                .await?
        };

        let mut collected: Vec<DigitalSignature> = sessions
            .iter()
            .filter_map(|session| session.signature().cloned())
            .collect();
        let participant_signed = unsigned
            .with_additional_signatures(own_signature.iter().cloned().chain(collected.clone()));

        let notary_sig = self.notarise(&participant_signed, &notary).await?;
        collected.push(notary_sig.clone());

        let final_tx = participant_signed.with_additional_signatures([notary_sig]);
        final_tx
            .verify_signatures()
            .map_err(|e| ProtocolError::AggregateVerificationFailed {
                reason: e.to_string(),
            })?;

        let broadcast = SignatureSet(own_signature.into_iter().chain(collected.clone()).collect());
        self.broadcast(&sessions, &broadcast).await;

        let newly_recorded = hub.record(&final_tx).await?;
        let successor = successor_of(&wtx)?;
        info!(
            tx = %final_tx.id(),
            signatures = final_tx.sigs().len(),
            newly_recorded,
            successor = %successor.state_ref,
            "replacement finalized"
        );
        Ok(ReplacementReport {
            successor,
            transaction: final_tx,
            collected,
        })
    }

    async fn notarise(
        &self,
        stx: &SignedTransaction,
        notary: &Party,
    ) -> Result<DigitalSignature, ProtocolError> {
        debug!(notary = %notary, "requesting notarisation");
        let attested: LegallyIdentifiableSignature =
            match tokio::time::timeout(self.config.notary_timeout(), self.hub.notarize(stx)).await
            {
                Ok(Ok(attested)) => attested,
                Ok(Err(e)) => {
                    return Err(ProtocolError::Notarisation {
                        reason: e.to_string(),
                    })
                }
                Err(_elapsed) => {
                    return Err(ProtocolError::Timeout {
                        peer: notary.name.clone(),
                        wait_point: WaitPoint::Notarisation,
                        timeout_ms: self.config.notary_timeout_ms,
                    })
                }
            };
        if attested.signer != *notary {
            return Err(ProtocolError::Notarisation {
                reason: format!(
                    "signature attributed to {} but the transaction names {notary}",
                    attested.signer
                ),
            });
        }
        attested
            .verify(stx.tx_bits())
            .map_err(|e| ProtocolError::SignatureValidationFailed {
                party: notary.name.clone(),
                reason: e.to_string(),
            })?;
        Ok(attested.signature)
    }

    /// Deliver the signature set to every participant
    ///
    /// The transaction is final once notarised; a participant that misses the
    /// broadcast does not fail the run.
    async fn broadcast(&self, sessions: &[PeerSession], set: &SignatureSet) {
        let hub = &*self.hub;
        let sends = sessions.iter().map(|session| async move {
            let sent = send_payload(
                hub,
                TOPIC_CHANGE,
                &session.party,
                session.send_session_id,
                set,
            )
            .await;
            (session, sent)
        });
        for (session, sent) in join_all(sends).await {
            if let Err(e) = sent {
                warn!(peer = %session.party, error = %e, "signature set not delivered");
            }
        }
    }
}

fn successor_of(wtx: &WireTransaction) -> Result<StateAndRef, ProtocolError> {
    wtx.out_ref(0)
        .map_err(|e| ProtocolError::InvalidTransaction {
            reason: e.to_string(),
        })
}
