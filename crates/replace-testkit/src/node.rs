//! Mock node implementing every effect a replacement run needs

use crate::{Directory, InMemoryNetwork, MemoryTransactionStore};
use async_trait::async_trait;
use parking_lot::Mutex;
use replace_core::{
    DigitalSignature, Hash32, IdentityEffects, KeyPair, LedgerTransaction,
    LegallyIdentifiableSignature, MessagingEffects, NotaryEffects, Party, PublicKey,
    ReplaceError, ResolutionEffects, Result, SessionId, SignedTransaction, SigningEffects,
    StorageEffects, Topic, ValidationEffects,
};
use std::sync::Arc;
use tracing::debug;

/// A node wired to the in-memory network, directory and its own store
pub struct MockNode {
    identity: Party,
    keys: KeyPair,
    network: Arc<InMemoryNetwork>,
    directory: Arc<Directory>,
    store: Arc<MemoryTransactionStore>,
    rule_failure: Mutex<Option<String>>,
}

impl MockNode {
    pub fn new(
        identity: Party,
        keys: KeyPair,
        network: Arc<InMemoryNetwork>,
        directory: Arc<Directory>,
        store: Arc<MemoryTransactionStore>,
    ) -> Self {
        Self {
            identity,
            keys,
            network,
            directory,
            store,
            rule_failure: Mutex::new(None),
        }
    }

    pub fn party(&self) -> &Party {
        &self.identity
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    pub fn store(&self) -> &Arc<MemoryTransactionStore> {
        &self.store
    }

    /// Make the rule engine reject every transaction with `reason`
    pub fn fail_validation_with(&self, reason: impl Into<String>) {
        *self.rule_failure.lock() = Some(reason.into());
    }
}

#[async_trait]
impl MessagingEffects for MockNode {
    async fn send(
        &self,
        topic: Topic,
        destination: &Party,
        session_id: SessionId,
        payload: Vec<u8>,
    ) -> Result<()> {
        self.network
            .deliver(&self.identity.name, &destination.name, topic, session_id, payload);
        Ok(())
    }

    async fn receive(&self, topic: Topic, session_id: SessionId) -> Result<Vec<u8>> {
        Ok(self
            .network
            .take(&self.identity.name, topic, session_id)
            .await)
    }
}

#[async_trait]
impl NotaryEffects for MockNode {
    async fn notarize(&self, stx: &SignedTransaction) -> Result<LegallyIdentifiableSignature> {
        let notary = stx
            .tx()?
            .notary
            .ok_or_else(|| ReplaceError::invalid("transaction names no notary"))?;
        let service = self
            .directory
            .notary(&notary.owning_key)
            .ok_or_else(|| ReplaceError::not_found(format!("notary service {notary}")))?;
        service.notarize(stx).await
    }
}

#[async_trait]
impl ResolutionEffects for MockNode {
    async fn resolve(&self, tx_hashes: &[Hash32], source: &Party) -> Result<()> {
        let missing: Vec<Hash32> = tx_hashes
            .iter()
            .filter(|id| !self.store.contains(id))
            .copied()
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        let remote = self
            .directory
            .store(&source.name)
            .ok_or_else(|| ReplaceError::network(format!("{source} is unreachable")))?;
        let fetched = remote.closure(&missing)?;
        debug!(node = %self.identity, from = %source, count = fetched.len(), "fetched dependencies");
        for stx in &fetched {
            stx.verify_signatures()?;
            self.store.insert(stx);
        }
        Ok(())
    }
}

#[async_trait]
impl ValidationEffects for MockNode {
    async fn verify_transaction(&self, ltx: &LedgerTransaction) -> Result<()> {
        let failure = self.rule_failure.lock().clone();
        if let Some(reason) = failure {
            return Err(ReplaceError::invalid(reason));
        }
        ltx.verify_type_rules()
    }
}

impl IdentityEffects for MockNode {
    fn legal_identity(&self) -> Party {
        self.identity.clone()
    }

    fn party_from_key(&self, key: &PublicKey) -> Option<Party> {
        self.directory.party(key)
    }

    fn notary_identities(&self) -> Vec<Party> {
        self.directory.notary_parties()
    }
}

#[async_trait]
impl SigningEffects for MockNode {
    async fn sign(&self, content: &[u8]) -> Result<DigitalSignature> {
        Ok(self.keys.sign(content))
    }
}

#[async_trait]
impl StorageEffects for MockNode {
    async fn record(&self, stx: &SignedTransaction) -> Result<bool> {
        Ok(self.store.insert(stx))
    }

    async fn transaction(&self, id: &Hash32) -> Result<Option<SignedTransaction>> {
        Ok(self.store.get(id))
    }
}
