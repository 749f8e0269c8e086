//! Minimal ledger transaction model
//!
//! A [`WireTransaction`] is the unsigned description of a ledger change. Its
//! canonical byte encoding is what every party signs, so [`SignedTransaction`]
//! keeps those bytes verbatim and never re-encodes them. A [`LedgerTransaction`]
//! is the wire form with every input reference resolved to its state.

use crate::{serialization, DigitalSignature, Hash32, Party, PublicKey, ReplaceError, Result, StateRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Application data held in a ledger state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractState {
    /// Name of the contract governing the state
    pub contract: String,
    /// Keys of every party that co-owns the state
    pub participants: Vec<PublicKey>,
    /// Opaque contract payload
    pub data: Vec<u8>,
}

/// A state together with the notary that controls its consumption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionState {
    /// The contract state
    pub data: ContractState,
    /// Notary responsible for preventing double spends of this state
    pub notary: Party,
}

impl TransactionState {
    /// Create a transaction state
    pub fn new(data: ContractState, notary: Party) -> Self {
        Self { data, notary }
    }

    /// Copy of this state moved under a different notary
    pub fn with_notary(&self, notary: Party) -> Self {
        Self {
            data: self.data.clone(),
            notary,
        }
    }
}

/// A resolved state and the reference that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateAndRef {
    /// The resolved state
    pub state: TransactionState,
    /// Where the state was produced
    pub state_ref: StateRef,
}

/// Kind of transaction, selecting which structural rules apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    /// Ordinary transaction, rules are left to the contract engine
    General,
    /// Re-points states at a new notary without touching their data
    NotaryChange,
}

/// Unsigned transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireTransaction {
    /// States consumed
    pub inputs: Vec<StateRef>,
    /// States produced
    pub outputs: Vec<TransactionState>,
    /// Keys whose signatures are mandatory
    pub signers: Vec<PublicKey>,
    /// Notary that must sign when inputs are consumed
    pub notary: Option<Party>,
    /// Structural rule set
    pub tx_type: TransactionType,
}

impl WireTransaction {
    /// Canonical byte encoding
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serialization::to_vec(self)
    }

    /// Transaction id, the hash of the canonical bytes
    pub fn id(&self) -> Result<Hash32> {
        Ok(Hash32::of(&self.to_bytes()?))
    }

    /// Keys that must have signed before the transaction is final
    pub fn required_signing_keys(&self) -> BTreeSet<PublicKey> {
        let mut keys: BTreeSet<PublicKey> = self.signers.iter().copied().collect();
        if let Some(notary) = &self.notary {
            keys.insert(notary.owning_key);
        }
        keys
    }

    /// Reference one of this transaction's outputs
    pub fn out_ref(&self, index: u32) -> Result<StateAndRef> {
        let state = self
            .outputs
            .get(index as usize)
            .cloned()
            .ok_or_else(|| ReplaceError::not_found(format!("transaction has no output {index}")))?;
        Ok(StateAndRef {
            state,
            state_ref: StateRef::new(self.id()?, index),
        })
    }

    /// Encode into a signed transaction carrying no signatures yet
    pub fn to_signed(&self) -> Result<SignedTransaction> {
        Ok(SignedTransaction::new(self.to_bytes()?, Vec::new()))
    }

    /// Attach resolved input states, in input order
    pub fn resolve(&self, id: Hash32, inputs: Vec<StateAndRef>) -> Result<LedgerTransaction> {
        let refs: Vec<StateRef> = inputs.iter().map(|input| input.state_ref).collect();
        if refs != self.inputs {
            return Err(ReplaceError::invalid(
                "resolved inputs do not match the transaction's input references",
            ));
        }
        Ok(LedgerTransaction {
            id,
            inputs,
            outputs: self.outputs.clone(),
            signers: self.signers.clone(),
            notary: self.notary.clone(),
            tx_type: self.tx_type,
        })
    }
}

/// Canonical transaction bytes plus the signatures gathered over them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    tx_bits: Vec<u8>,
    sigs: Vec<DigitalSignature>,
}

impl SignedTransaction {
    /// Wrap already-encoded transaction bytes
    pub fn new(tx_bits: Vec<u8>, sigs: Vec<DigitalSignature>) -> Self {
        Self { tx_bits, sigs }
    }

    /// Id of the wrapped transaction
    pub fn id(&self) -> Hash32 {
        Hash32::of(&self.tx_bits)
    }

    /// The exact bytes every signature is made over
    pub fn tx_bits(&self) -> &[u8] {
        &self.tx_bits
    }

    /// Signatures in the order they were attached
    pub fn sigs(&self) -> &[DigitalSignature] {
        &self.sigs
    }

    /// Decode the wrapped transaction
    pub fn tx(&self) -> Result<WireTransaction> {
        serialization::from_slice(&self.tx_bits)
    }

    /// Keys that have signed
    pub fn signing_keys(&self) -> BTreeSet<PublicKey> {
        self.sigs.iter().map(|sig| sig.by).collect()
    }

    /// Append signatures, skipping any key that has already signed
    pub fn with_additional_signatures(
        &self,
        sigs: impl IntoIterator<Item = DigitalSignature>,
    ) -> Self {
        let mut merged = self.clone();
        for sig in sigs {
            if !merged.sigs.iter().any(|existing| existing.by == sig.by) {
                merged.sigs.push(sig);
            }
        }
        merged
    }

    /// Required keys with no signature attached
    pub fn missing_signers(&self) -> Result<BTreeSet<PublicKey>> {
        let present = self.signing_keys();
        Ok(self
            .tx()?
            .required_signing_keys()
            .into_iter()
            .filter(|key| !present.contains(key))
            .collect())
    }

    /// Check every attached signature and that the signers are exactly the
    /// required keys, tolerating absence of the keys in `allowed_missing`
    pub fn verify_signatures_except(
        &self,
        allowed_missing: &[PublicKey],
    ) -> Result<WireTransaction> {
        let wtx = self.tx()?;
        let required = wtx.required_signing_keys();
        let mut present = BTreeSet::new();
        for sig in &self.sigs {
            sig.verify(&self.tx_bits)?;
            if !required.contains(&sig.by) {
                return Err(ReplaceError::invalid(format!(
                    "unexpected signature from {}",
                    sig.by.short()
                )));
            }
            if !present.insert(sig.by) {
                return Err(ReplaceError::invalid(format!(
                    "duplicate signature from {}",
                    sig.by.short()
                )));
            }
        }
        let missing: Vec<String> = required
            .into_iter()
            .filter(|key| !present.contains(key) && !allowed_missing.contains(key))
            .map(|key| key.short())
            .collect();
        if !missing.is_empty() {
            return Err(ReplaceError::invalid(format!(
                "missing signatures from {}",
                missing.join(", ")
            )));
        }
        Ok(wtx)
    }

    /// Check every attached signature and that the signers are exactly the
    /// required keys
    pub fn verify_signatures(&self) -> Result<WireTransaction> {
        self.verify_signatures_except(&[])
    }
}

/// Transaction with all inputs resolved, as seen by the validation engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerTransaction {
    /// Transaction id
    pub id: Hash32,
    /// Consumed states
    pub inputs: Vec<StateAndRef>,
    /// Produced states
    pub outputs: Vec<TransactionState>,
    /// Mandatory signers
    pub signers: Vec<PublicKey>,
    /// Notarising party
    pub notary: Option<Party>,
    /// Structural rule set
    pub tx_type: TransactionType,
}

impl LedgerTransaction {
    /// Keys that must have signed before the transaction is final
    pub fn required_signing_keys(&self) -> BTreeSet<PublicKey> {
        self.signers
            .iter()
            .copied()
            .chain(self.notary.iter().map(|notary| notary.owning_key))
            .collect()
    }

    /// Check the structural rules implied by the transaction type
    pub fn verify_type_rules(&self) -> Result<()> {
        let unique: BTreeSet<StateRef> = self.inputs.iter().map(|input| input.state_ref).collect();
        if unique.len() != self.inputs.len() {
            return Err(ReplaceError::invalid("transaction consumes a state twice"));
        }

        if !self.inputs.is_empty() {
            let notary = self.notary.as_ref().ok_or_else(|| {
                ReplaceError::invalid("transaction consuming states must name a notary")
            })?;
            for input in &self.inputs {
                if input.state.notary != *notary {
                    return Err(ReplaceError::invalid(format!(
                        "input {} is controlled by {} but the transaction names {}",
                        input.state_ref, input.state.notary, notary
                    )));
                }
            }
        }

        let signers: BTreeSet<&PublicKey> = self.signers.iter().collect();
        for input in &self.inputs {
            if let Some(key) = input
                .state
                .data
                .participants
                .iter()
                .find(|key| !signers.contains(key))
            {
                return Err(ReplaceError::invalid(format!(
                    "participant {} of {} is not a required signer",
                    key.short(),
                    input.state_ref
                )));
            }
        }

        match self.tx_type {
            TransactionType::General => Ok(()),
            TransactionType::NotaryChange => self.verify_notary_change(),
        }
    }

    fn verify_notary_change(&self) -> Result<()> {
        if self.inputs.len() != self.outputs.len() {
            return Err(ReplaceError::invalid(
                "notary change must produce exactly one output per input",
            ));
        }
        for (input, output) in self.inputs.iter().zip(&self.outputs) {
            if input.state.data != output.data {
                return Err(ReplaceError::invalid(format!(
                    "notary change modifies the data of {}",
                    input.state_ref
                )));
            }
        }
        Ok(())
    }
}
