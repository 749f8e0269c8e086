//! In-memory transaction store

use parking_lot::RwLock;
use replace_core::{Hash32, ReplaceError, Result, SignedTransaction};
use std::collections::{BTreeSet, HashMap};

/// Transaction store keyed by transaction id
#[derive(Debug, Default)]
pub struct MemoryTransactionStore {
    transactions: RwLock<HashMap<Hash32, SignedTransaction>>,
}

impl MemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `stx`; returns `false` if its id was already present
    pub fn insert(&self, stx: &SignedTransaction) -> bool {
        let mut transactions = self.transactions.write();
        if transactions.contains_key(&stx.id()) {
            return false;
        }
        transactions.insert(stx.id(), stx.clone());
        true
    }

    pub fn get(&self, id: &Hash32) -> Option<SignedTransaction> {
        self.transactions.read().get(id).cloned()
    }

    pub fn contains(&self, id: &Hash32) -> bool {
        self.transactions.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.transactions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.read().is_empty()
    }

    /// The transactions `ids` and everything they transitively consume
    pub fn closure(&self, ids: &[Hash32]) -> Result<Vec<SignedTransaction>> {
        let transactions = self.transactions.read();
        let mut seen = BTreeSet::new();
        let mut pending: Vec<Hash32> = ids.to_vec();
        let mut closure = Vec::new();
        while let Some(id) = pending.pop() {
            if !seen.insert(id) {
                continue;
            }
            let stx = transactions
                .get(&id)
                .ok_or_else(|| ReplaceError::not_found(format!("transaction {id}")))?;
            pending.extend(stx.tx()?.inputs.iter().map(|input| input.txhash));
            closure.push(stx.clone());
        }
        Ok(closure)
    }
}
