//! Ed25519 keys and signatures
//!
//! Every signature carries the key it claims to be made by, so a verifier can
//! check both the signer identity and the signed bytes. Signing key material is
//! held in [`KeyPair`] only and never serialized.

use crate::{hash, Party, ReplaceError, Result};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

/// 32-byte Ed25519 public key
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    /// Short hex prefix for logs
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }

    fn verifying_key(&self) -> Result<VerifyingKey> {
        VerifyingKey::from_bytes(&self.0)
            .map_err(|e| ReplaceError::crypto(format!("invalid public key {}: {e}", self.short())))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.short())
    }
}

/// Ed25519 signing identity
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a fresh key pair from the OS random source
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut rand::rngs::OsRng),
        }
    }

    /// Build a key pair from a 32-byte secret seed
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let seed = Zeroizing::new(seed);
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Derive a deterministic key pair from a label
    ///
    /// Intended for fixtures and simulations; the secret is only as strong as
    /// the label is unguessable.
    pub fn from_label(label: &str) -> Self {
        Self::from_seed(hash::hash(label.as_bytes()))
    }

    /// The public half of this key pair
    pub fn public(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign the given bytes
    pub fn sign(&self, content: &[u8]) -> DigitalSignature {
        let signature = self.signing_key.sign(content);
        DigitalSignature {
            by: self.public(),
            bytes: signature.to_bytes().to_vec(),
        }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("signing_key", &"[REDACTED]")
            .field("public", &self.public())
            .finish()
    }
}

/// A signature together with the key that claims to have produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitalSignature {
    /// Key the signature claims to be made by
    pub by: PublicKey,
    /// Raw 64-byte Ed25519 signature
    pub bytes: Vec<u8>,
}

impl DigitalSignature {
    /// Verify the signature against `content` under the embedded key
    pub fn verify(&self, content: &[u8]) -> Result<()> {
        let signature = Signature::from_slice(&self.bytes)
            .map_err(|e| ReplaceError::crypto(format!("malformed signature: {e}")))?;
        self.by
            .verifying_key()?
            .verify_strict(content, &signature)
            .map_err(|_| {
                ReplaceError::crypto(format!("signature by {} does not verify", self.by.short()))
            })
    }

    /// Verify that the signature is by `expected` and valid over `content`
    pub fn verify_with_key(&self, content: &[u8], expected: &PublicKey) -> Result<()> {
        if self.by != *expected {
            return Err(ReplaceError::crypto(format!(
                "signature is by {} but {} was expected",
                self.by.short(),
                expected.short()
            )));
        }
        self.verify(content)
    }

    /// Boolean form of [`Self::verify`]
    pub fn is_valid(&self, content: &[u8]) -> bool {
        self.verify(content).is_ok()
    }
}

/// Signature attributable to a named party, as returned by a notary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegallyIdentifiableSignature {
    /// Party the signature is attributed to
    pub signer: Party,
    /// The signature itself
    pub signature: DigitalSignature,
}

impl LegallyIdentifiableSignature {
    /// Attribute a signature to a party
    pub fn new(signer: Party, signature: DigitalSignature) -> Self {
        Self { signer, signature }
    }

    /// Verify the signature is by the party's owning key and valid over `content`
    pub fn verify(&self, content: &[u8]) -> Result<()> {
        self.signature
            .verify_with_key(content, &self.signer.owning_key)
    }
}
