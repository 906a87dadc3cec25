//! Ed25519 keys used to sign transaction bodies.
//!
//! Public keys are accepted either as raw 32 bytes or DER/SPKI encoded, which
//! is how keys are usually exported by wallets and key management services.

use std::fmt;
use std::sync::Arc;

use ed25519_dalek::{pkcs8::DecodePublicKey, Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::models::SigningError;

/// Produces signatures over the given body bytes. Invoked lazily at
/// serialization time.
pub type SignerFn = Arc<dyn Fn(&[u8]) -> Vec<u8> + Send + Sync>;

/// A public key identifying a signer. Ordered by its raw bytes so signature
/// maps serialize deterministically.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicKey(Vec<u8>);

impl PublicKey {
    /// Wraps raw key bytes without validation.
    pub fn from_raw(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Parses an Ed25519 public key from raw or DER/SPKI encoded bytes.
    pub fn from_ed25519_bytes(bytes: &[u8]) -> Result<Self, SigningError> {
        if bytes.len() == 32 {
            return Ok(Self(bytes.to_vec()));
        }

        let verifying_key = VerifyingKey::from_public_key_der(bytes)
            .map_err(|e| SigningError::InvalidKey(format!("ASN.1 parse error: {e}")))?;
        Ok(Self(verifying_key.to_bytes().to_vec()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Verifies an Ed25519 `signature` over `message`.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), SigningError> {
        let key_bytes: [u8; 32] = self
            .0
            .as_slice()
            .try_into()
            .map_err(|_| SigningError::InvalidKey(format!("expected 32 bytes, got {}", self.0.len())))?;
        let verifying_key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        let signature = Signature::from_slice(signature)
            .map_err(|e| SigningError::InvalidSignature(e.to_string()))?;

        verifying_key
            .verify(message, &signature)
            .map_err(|e| SigningError::InvalidSignature(e.to_string()))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(&self.0))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

/// Something able to sign transaction bodies on behalf of a public key.
pub trait TransactionSigner: Send + Sync {
    fn public_key(&self) -> PublicKey;

    fn sign(&self, message: &[u8]) -> Vec<u8>;
}

/// Ed25519 private key held in memory.
#[derive(Clone)]
pub struct Ed25519PrivateKey {
    key: SigningKey,
}

impl Ed25519PrivateKey {
    pub fn generate() -> Self {
        let seed: [u8; 32] = rand::random();
        Self::from_seed(&seed)
    }

    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(seed),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SigningError> {
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SigningError::InvalidKey(format!("expected 32 bytes, got {}", bytes.len())))?;
        Ok(Self::from_seed(&seed))
    }

    /// Returns this key as a deferred signer function.
    pub fn signer_fn(&self) -> SignerFn {
        let key = self.key.clone();
        Arc::new(move |message: &[u8]| key.sign(message).to_bytes().to_vec())
    }
}

impl TransactionSigner for Ed25519PrivateKey {
    fn public_key(&self) -> PublicKey {
        PublicKey(self.key.verifying_key().to_bytes().to_vec())
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.key.sign(message).to_bytes().to_vec()
    }
}

impl fmt::Debug for Ed25519PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519PrivateKey")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}
