//! Effect trait definitions
//!
//! The replacement protocol never talks to the network, the notary, the key
//! store or the transaction store directly. It is parameterized by these
//! traits so hosts plug in real services and tests plug in in-memory ones.
//!
//! - **MessagingEffects**: topic/session addressed point-to-point messages
//! - **NotaryEffects**: obtain a notarising signature
//! - **ResolutionEffects**: fetch a transaction's dependency closure from a peer
//! - **ValidationEffects**: run the ledger rule engine over a resolved transaction
//! - **IdentityEffects**: local identity and the network directory
//! - **SigningEffects**: sign with the local key
//! - **StorageEffects**: durable transaction store
//!
//! [`ServiceHub`] is the composite every protocol role is written against.

use crate::{
    DigitalSignature, Hash32, LedgerTransaction, LegallyIdentifiableSignature, Party, PublicKey,
    ReplaceError, Result, SessionId, SignedTransaction, StateRef, Topic, TransactionState,
};
use async_trait::async_trait;

/// Point-to-point messaging addressed by topic and session
#[async_trait]
pub trait MessagingEffects: Send + Sync {
    /// Deliver `payload` to `destination` on (`topic`, `session_id`)
    async fn send(
        &self,
        topic: Topic,
        destination: &Party,
        session_id: SessionId,
        payload: Vec<u8>,
    ) -> Result<()>;

    /// Wait for the next message addressed to this node on (`topic`, `session_id`)
    ///
    /// Callers bound the wait; implementations suspend without blocking a thread.
    async fn receive(&self, topic: Topic, session_id: SessionId) -> Result<Vec<u8>>;

    /// Send on one session and wait for the reply on another
    async fn send_and_receive(
        &self,
        topic: Topic,
        destination: &Party,
        send_session_id: SessionId,
        receive_session_id: SessionId,
        payload: Vec<u8>,
    ) -> Result<Vec<u8>> {
        self.send(topic, destination, send_session_id, payload)
            .await?;
        self.receive(topic, receive_session_id).await
    }
}

/// Notary client capability
#[async_trait]
pub trait NotaryEffects: Send + Sync {
    /// Ask the transaction's notary to attest that its inputs are not double spent
    async fn notarize(&self, stx: &SignedTransaction) -> Result<LegallyIdentifiableSignature>;
}

/// Transaction dependency resolution
#[async_trait]
pub trait ResolutionEffects: Send + Sync {
    /// Make the transitive closure of `tx_hashes` available locally, fetching
    /// missing transactions from `source`
    async fn resolve(&self, tx_hashes: &[Hash32], source: &Party) -> Result<()>;
}

/// Ledger rule engine
#[async_trait]
pub trait ValidationEffects: Send + Sync {
    /// Run contract and ledger rules over a resolved transaction
    async fn verify_transaction(&self, ltx: &LedgerTransaction) -> Result<()>;
}

/// Local identity and network directory
pub trait IdentityEffects: Send + Sync {
    /// This node's legal identity
    fn legal_identity(&self) -> Party;

    /// Look up the party owning `key`
    fn party_from_key(&self, key: &PublicKey) -> Option<Party>;

    /// Parties advertising a notary service
    fn notary_identities(&self) -> Vec<Party>;

    /// Whether `party` advertises a notary service
    fn is_notary(&self, party: &Party) -> bool {
        self.notary_identities().iter().any(|notary| notary == party)
    }
}

/// Signing with the local key
#[async_trait]
pub trait SigningEffects: Send + Sync {
    /// Sign `content` with this node's legal identity key
    async fn sign(&self, content: &[u8]) -> Result<DigitalSignature>;

    /// Check `signature` is by `expected` and valid over `content`
    fn verify_signature(
        &self,
        signature: &DigitalSignature,
        content: &[u8],
        expected: &PublicKey,
    ) -> bool {
        signature.verify_with_key(content, expected).is_ok()
    }
}

/// Durable transaction store
#[async_trait]
pub trait StorageEffects: Send + Sync {
    /// Record a finalized transaction
    ///
    /// Returns `false` when an identical transaction was already stored, in
    /// which case the call has no effect.
    async fn record(&self, stx: &SignedTransaction) -> Result<bool>;

    /// Look up a recorded transaction
    async fn transaction(&self, id: &Hash32) -> Result<Option<SignedTransaction>>;

    /// Load the state a reference points at
    async fn load_state(&self, state_ref: &StateRef) -> Result<TransactionState> {
        let stx = self.transaction(&state_ref.txhash).await?.ok_or_else(|| {
            ReplaceError::not_found(format!("transaction {}", state_ref.txhash))
        })?;
        let wtx = stx.tx()?;
        wtx.outputs
            .get(state_ref.index as usize)
            .cloned()
            .ok_or_else(|| ReplaceError::not_found(format!("state {state_ref}")))
    }
}

/// Every capability a replacement run needs
pub trait ServiceHub:
    MessagingEffects
    + NotaryEffects
    + ResolutionEffects
    + ValidationEffects
    + IdentityEffects
    + SigningEffects
    + StorageEffects
    + Send
    + Sync
{
}

/// Blanket implementation for any type that implements all required traits.
impl<T> ServiceHub for T where
    T: MessagingEffects
        + NotaryEffects
        + ResolutionEffects
        + ValidationEffects
        + IdentityEffects
        + SigningEffects
        + StorageEffects
        + Send
        + Sync
        + ?Sized
{
}
