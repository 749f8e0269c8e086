//! Test network builder
//!
//! Keys are derived from party names, so the same name always yields the
//! same identity across runs.

use crate::{Directory, InMemoryNetwork, MemoryTransactionStore, MockNode, MockNotary};
use replace_core::{
    ContractState, KeyPair, Party, Result, SigningEffects, StateAndRef, TransactionState,
    TransactionType, WireTransaction,
};
use std::sync::Arc;

/// Contract name used for issued fixture states
pub const TEST_CONTRACT: &str = "test-asset";

/// A set of nodes and notaries sharing one network and directory
pub struct TestNetwork {
    network: Arc<InMemoryNetwork>,
    directory: Arc<Directory>,
}

impl Default for TestNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl TestNetwork {
    pub fn new() -> Self {
        Self {
            network: InMemoryNetwork::new(),
            directory: Directory::new(),
        }
    }

    pub fn network(&self) -> &Arc<InMemoryNetwork> {
        &self.network
    }

    pub fn directory(&self) -> &Arc<Directory> {
        &self.directory
    }

    /// Add a node named `name` with an empty store
    pub fn create_node(&self, name: &str) -> Arc<MockNode> {
        let keys = KeyPair::from_label(name);
        let identity = Party::new(name, keys.public());
        let store = Arc::new(MemoryTransactionStore::new());
        self.directory
            .register_node(identity.clone(), Arc::clone(&store));
        Arc::new(MockNode::new(
            identity,
            keys,
            Arc::clone(&self.network),
            Arc::clone(&self.directory),
            store,
        ))
    }

    /// Add a notary service named `name`
    pub fn create_notary(&self, name: &str) -> Arc<MockNotary> {
        let notary = Arc::new(MockNotary::new(name));
        self.directory.register_notary(Arc::clone(&notary));
        notary
    }

    /// Issue a state co-owned by `owners`, recorded in every owner's store
    pub async fn issue_state(
        &self,
        owners: &[&Arc<MockNode>],
        notary: &Party,
        data: &[u8],
    ) -> Result<StateAndRef> {
        let participants: Vec<_> = owners.iter().map(|node| node.party().owning_key).collect();
        let wtx = WireTransaction {
            inputs: vec![],
            outputs: vec![TransactionState::new(
                ContractState {
                    contract: TEST_CONTRACT.to_string(),
                    participants: participants.clone(),
                    data: data.to_vec(),
                },
                notary.clone(),
            )],
            signers: participants,
            notary: None,
            tx_type: TransactionType::General,
        };
        let mut stx = wtx.to_signed()?;
        for owner in owners {
            let sig = owner.sign(stx.tx_bits()).await?;
            stx = stx.with_additional_signatures([sig]);
        }
        stx.verify_signatures()?;
        for owner in owners {
            owner.store().insert(&stx);
        }
        wtx.out_ref(0)
    }
}
