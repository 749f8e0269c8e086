//! Mock notary with double-spend detection

use parking_lot::Mutex;
use replace_core::{
    Hash32, KeyPair, LegallyIdentifiableSignature, Party, ReplaceError, Result,
    SignedTransaction, StateRef,
};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Notary that remembers which transaction consumed each state
pub struct MockNotary {
    identity: Party,
    keys: KeyPair,
    consumed: Mutex<HashMap<StateRef, Hash32>>,
    delay: Mutex<Option<Duration>>,
}

impl MockNotary {
    pub fn new(name: &str) -> Self {
        let keys = KeyPair::from_label(name);
        Self {
            identity: Party::new(name, keys.public()),
            keys,
            consumed: Mutex::new(HashMap::new()),
            delay: Mutex::new(None),
        }
    }

    pub fn party(&self) -> &Party {
        &self.identity
    }

    /// Hold every later answer back by `delay`
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Transaction that consumed `state_ref`, if any
    pub fn consumed_by(&self, state_ref: &StateRef) -> Option<Hash32> {
        self.consumed.lock().get(state_ref).copied()
    }

    /// Check participant signatures and uniqueness, then sign
    ///
    /// Notarising the same transaction twice succeeds both times; consuming
    /// an input already consumed by a different transaction does not.
    pub async fn notarize(&self, stx: &SignedTransaction) -> Result<LegallyIdentifiableSignature> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let wtx = stx.verify_signatures_except(&[self.identity.owning_key])?;
        if wtx.notary.as_ref() != Some(&self.identity) {
            return Err(ReplaceError::invalid(format!(
                "{} is not the notary of transaction {}",
                self.identity,
                stx.id()
            )));
        }

        let id = stx.id();
        {
            let mut consumed = self.consumed.lock();
            if let Some((input, spender)) = wtx.inputs.iter().find_map(|input| {
                consumed
                    .get(input)
                    .filter(|spender| **spender != id)
                    .map(|spender| (input, *spender))
            }) {
                return Err(ReplaceError::invalid(format!(
                    "double spend: {input} already consumed by {spender}"
                )));
            }
            for input in &wtx.inputs {
                consumed.insert(*input, id);
            }
        }

        debug!(notary = %self.identity, tx = %id, "notarised");
        Ok(LegallyIdentifiableSignature::new(
            self.identity.clone(),
            self.keys.sign(stx.tx_bits()),
        ))
    }
}
