//! Signature assembly for frozen transactions.
//!
//! Every node-specific copy of a transaction carries its own [`SignatureMap`].
//! A map holds at most one entry per public key and writing a key that is
//! already present replaces the previous entry. A garbage signature injected
//! for a key is therefore always repaired by a later `sign_with` or
//! `add_signature` for that key.
//!
//! Deferred signers are stored as [`SignatureSlot::Deferred`] and invoked once,
//! the first time the copy is serialized. The produced bytes replace the slot
//! so that later serializations do not sign again.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{PublicKey, SignerFn};

/// Signature entry for a single public key.
#[derive(Clone)]
pub enum SignatureSlot {
    Immediate(Vec<u8>),
    Deferred(SignerFn),
}

impl fmt::Debug for SignatureSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureSlot::Immediate(bytes) => {
                f.debug_tuple("Immediate").field(&hex::encode(bytes)).finish()
            }
            SignatureSlot::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

/// A resolved `(public key, signature)` pair as it appears on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignaturePair {
    pub public_key: PublicKey,
    pub signature: Vec<u8>,
}

/// Signatures of one node-specific transaction copy, keyed by public key.
#[derive(Clone, Debug, Default)]
pub struct SignatureMap {
    entries: BTreeMap<PublicKey, SignatureSlot>,
}

impl SignatureMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the slot for `public_key`, replacing any existing entry.
    ///
    /// # Returns
    /// * `Option<SignatureSlot>` - The replaced slot, if there was one
    pub fn insert(&mut self, public_key: PublicKey, slot: SignatureSlot) -> Option<SignatureSlot> {
        self.entries.insert(public_key, slot)
    }

    pub fn get(&self, public_key: &PublicKey) -> Option<&SignatureSlot> {
        self.entries.get(public_key)
    }

    pub fn contains(&self, public_key: &PublicKey) -> bool {
        self.entries.contains_key(public_key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Invokes pending deferred signers over `body` and returns every pair in
    /// key order.
    pub fn resolve(&mut self, body: &[u8]) -> Vec<SignaturePair> {
        self.entries
            .iter_mut()
            .map(|(public_key, slot)| {
                let signature = match slot {
                    SignatureSlot::Immediate(bytes) => bytes.clone(),
                    SignatureSlot::Deferred(signer) => {
                        let bytes = signer(body);
                        *slot = SignatureSlot::Immediate(bytes.clone());
                        bytes
                    }
                };
                SignaturePair {
                    public_key: public_key.clone(),
                    signature,
                }
            })
            .collect()
    }

    /// Signatures already materialized, deferred slots excluded.
    pub fn signatures(&self) -> BTreeMap<PublicKey, Vec<u8>> {
        self.entries
            .iter()
            .filter_map(|(public_key, slot)| match slot {
                SignatureSlot::Immediate(bytes) => Some((public_key.clone(), bytes.clone())),
                SignatureSlot::Deferred(_) => None,
            })
            .collect()
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = SignaturePair>) -> Self {
        let mut map = Self::new();
        for pair in pairs {
            map.insert(pair.public_key, SignatureSlot::Immediate(pair.signature));
        }
        map
    }
}

/// Manages the signature maps of all node copies of one transaction.
///
/// Deferred signers are also remembered in a registry so they can be re-armed
/// when the transaction id is regenerated and every copy is rebuilt.
#[derive(Clone, Debug, Default)]
pub struct SignatureAssembler {
    copies: Vec<SignatureMap>,
    signers: BTreeMap<PublicKey, DebugSigner>,
}

#[derive(Clone)]
struct DebugSigner(SignerFn);

impl fmt::Debug for DebugSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SignerFn")
    }
}

impl SignatureAssembler {
    pub fn new(copies: usize) -> Self {
        Self {
            copies: vec![SignatureMap::new(); copies],
            signers: BTreeMap::new(),
        }
    }

    /// Builds an assembler from already signed copies.
    pub fn from_maps(copies: Vec<SignatureMap>) -> Self {
        Self {
            copies,
            signers: BTreeMap::new(),
        }
    }

    pub fn copy_count(&self) -> usize {
        self.copies.len()
    }

    pub fn map(&self, copy: usize) -> Option<&SignatureMap> {
        self.copies.get(copy)
    }

    /// Stores a precomputed signature for `public_key` on one copy,
    /// overwriting whatever that key had there.
    pub fn add_signature(&mut self, copy: usize, public_key: PublicKey, signature: Vec<u8>) {
        if let Some(map) = self.copies.get_mut(copy) {
            map.insert(public_key.clone(), SignatureSlot::Immediate(signature));
        }
        // an explicit signature supersedes the signer for later rebuilds too
        self.signers.remove(&public_key);
    }

    /// Registers `signer` for `public_key` on every copy, overwriting existing
    /// entries for that key.
    pub fn sign_with(&mut self, public_key: PublicKey, signer: SignerFn) {
        for map in &mut self.copies {
            map.insert(public_key.clone(), SignatureSlot::Deferred(signer.clone()));
        }
        self.signers.insert(public_key, DebugSigner(signer));
    }

    pub fn is_signed_by(&self, public_key: &PublicKey) -> bool {
        self.copies.iter().any(|map| map.contains(public_key))
    }

    /// Resolves the signatures of one copy over its body bytes.
    pub fn resolve(&mut self, copy: usize, body: &[u8]) -> Vec<SignaturePair> {
        self.copies
            .get_mut(copy)
            .map(|map| map.resolve(body))
            .unwrap_or_default()
    }

    /// Discards every copy and rebuilds `copies` fresh maps carrying only the
    /// registered deferred signers.
    pub fn rearm(&mut self, copies: usize) {
        self.copies = (0..copies)
            .map(|_| {
                let mut map = SignatureMap::new();
                for (public_key, signer) in &self.signers {
                    map.insert(public_key.clone(), SignatureSlot::Deferred(signer.0.clone()));
                }
                map
            })
            .collect();
    }
}
