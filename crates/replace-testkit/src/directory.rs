//! Network map shared by every node of a test

use crate::{MemoryTransactionStore, MockNotary};
use parking_lot::RwLock;
use replace_core::{Party, PublicKey};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Known parties, their stores and the notary services
#[derive(Default)]
pub struct Directory {
    parties: RwLock<BTreeMap<PublicKey, Party>>,
    stores: RwLock<HashMap<String, Arc<MemoryTransactionStore>>>,
    notaries: RwLock<HashMap<PublicKey, Arc<MockNotary>>>,
}

impl Directory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `party` resolvable and its store reachable for dependency fetches
    pub fn register_node(&self, party: Party, store: Arc<MemoryTransactionStore>) {
        self.stores.write().insert(party.name.clone(), store);
        self.parties.write().insert(party.owning_key, party);
    }

    /// Advertise a notary service
    pub fn register_notary(&self, notary: Arc<MockNotary>) {
        let party = notary.party().clone();
        self.notaries.write().insert(party.owning_key, notary);
        self.parties.write().insert(party.owning_key, party);
    }

    pub fn party(&self, key: &PublicKey) -> Option<Party> {
        self.parties.read().get(key).cloned()
    }

    pub fn store(&self, name: &str) -> Option<Arc<MemoryTransactionStore>> {
        self.stores.read().get(name).cloned()
    }

    pub fn notary(&self, key: &PublicKey) -> Option<Arc<MockNotary>> {
        self.notaries.read().get(key).cloned()
    }

    pub fn notary_parties(&self) -> Vec<Party> {
        self.notaries
            .read()
            .values()
            .map(|notary| notary.party().clone())
            .collect()
    }
}
