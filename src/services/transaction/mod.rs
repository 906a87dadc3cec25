//! Frozen transactions and their node-specific copies.
//!
//! Freezing a transaction fixes its id and candidate node list and encodes one
//! body per node. From then on only signatures may change, until the engine
//! regenerates an expired id, which rebuilds every copy and re-arms the
//! registered signers.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha384};

use crate::models::{AccountId, SigningError, TransactionError, TransactionId};
use crate::services::signing::{
    PublicKey, SignatureAssembler, SignatureMap, SignaturePair, SignerFn, TransactionSigner,
};

mod body;
pub use body::*;

/// Body bytes and signatures as sent to a node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub body_bytes: Vec<u8>,
    pub signatures: Vec<SignaturePair>,
}

impl SignedTransaction {
    pub fn to_bytes(&self) -> Result<Vec<u8>, TransactionError> {
        Ok(bincode::serialize(self)?)
    }

    /// SHA-384 of the serialized signed transaction.
    pub fn hash(&self) -> Result<Vec<u8>, TransactionError> {
        Ok(transaction_hash(&self.to_bytes()?))
    }
}

/// Hash identifying a signed transaction on the network (SHA-384).
pub fn transaction_hash(signed_bytes: &[u8]) -> Vec<u8> {
    Sha384::digest(signed_bytes).to_vec()
}

/// A node copy ready to be signed offline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignableNodeBody {
    pub node_account_id: AccountId,
    pub transaction_id: TransactionId,
    pub body: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct TransactionListEntry {
    transaction_id: TransactionId,
    node_account_id: AccountId,
    signed: SignedTransaction,
}

#[derive(Clone, Debug)]
struct NodeCopy {
    node_account_id: AccountId,
    body_bytes: Vec<u8>,
}

#[derive(Clone)]
pub struct Transaction {
    transaction_id: Option<TransactionId>,
    node_account_ids: Vec<AccountId>,
    body: Option<Arc<dyn TransactionBody>>,
    copies: Vec<NodeCopy>,
    assembler: SignatureAssembler,
    /// Set when the id must not be replaced: chosen by the caller, covered by
    /// externally produced signatures, or decoded from bytes.
    id_locked: bool,
    regenerate_transaction_id: Option<bool>,
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("transaction_id", &self.transaction_id)
            .field("node_account_ids", &self.node_account_ids)
            .field("kind", &self.kind())
            .field("frozen", &self.is_frozen())
            .field("id_locked", &self.id_locked)
            .finish()
    }
}

impl Transaction {
    pub fn new(body: impl TransactionBody + 'static) -> Self {
        Self::from_body(Arc::new(body))
    }

    pub fn from_body(body: Arc<dyn TransactionBody>) -> Self {
        Self {
            transaction_id: None,
            node_account_ids: Vec::new(),
            body: Some(body),
            copies: Vec::new(),
            assembler: SignatureAssembler::new(0),
            id_locked: false,
            regenerate_transaction_id: None,
        }
    }

    /// Sets an explicit transaction id. An explicit id is never regenerated.
    pub fn with_transaction_id(mut self, transaction_id: TransactionId) -> Self {
        self.transaction_id = Some(transaction_id);
        self.id_locked = true;
        self
    }

    /// Sets the id without locking it; used by the client when it picks the id.
    pub(crate) fn set_generated_transaction_id(&mut self, transaction_id: TransactionId) {
        self.transaction_id = Some(transaction_id);
    }

    /// Pins the candidate nodes of this transaction.
    pub fn with_node_account_ids(mut self, node_account_ids: Vec<AccountId>) -> Self {
        self.node_account_ids = node_account_ids;
        self
    }

    pub(crate) fn set_node_account_ids(&mut self, node_account_ids: Vec<AccountId>) {
        self.node_account_ids = node_account_ids;
    }

    /// Overrides the client-wide choice of replacing an expired id.
    pub fn with_regenerate_transaction_id(mut self, regenerate: bool) -> Self {
        self.regenerate_transaction_id = Some(regenerate);
        self
    }

    pub fn transaction_id(&self) -> Option<TransactionId> {
        self.transaction_id
    }

    pub fn node_account_ids(&self) -> &[AccountId] {
        &self.node_account_ids
    }

    pub fn is_frozen(&self) -> bool {
        !self.copies.is_empty()
    }

    pub fn is_id_locked(&self) -> bool {
        self.id_locked
    }

    pub fn kind(&self) -> &'static str {
        self.body.as_ref().map(|body| body.kind()).unwrap_or("decoded")
    }

    /// Encodes one copy per candidate node.
    ///
    /// # Returns
    /// * `Ok(())` - The transaction is frozen (or already was)
    /// * `Err(TransactionError)` - No id or nodes were set, or encoding failed
    pub fn freeze(&mut self) -> Result<(), TransactionError> {
        if self.is_frozen() {
            return Ok(());
        }
        let transaction_id = self.transaction_id.ok_or_else(|| {
            TransactionError::Validation("transaction id must be set before freezing".into())
        })?;
        if self.node_account_ids.is_empty() {
            return Err(TransactionError::NoNodes);
        }

        self.copies = self.encode_copies(&transaction_id)?;
        self.assembler.rearm(self.copies.len());
        Ok(())
    }

    fn encode_copies(&self, transaction_id: &TransactionId) -> Result<Vec<NodeCopy>, TransactionError> {
        let body = self.body.as_ref().ok_or_else(|| {
            TransactionError::Validation("decoded transactions cannot be re-encoded".into())
        })?;
        self.node_account_ids
            .iter()
            .map(|node_account_id| {
                Ok(NodeCopy {
                    node_account_id: *node_account_id,
                    body_bytes: body.encode(&BodyContext {
                        transaction_id,
                        node_account_id,
                    })?,
                })
            })
            .collect()
    }

    /// Signs every copy with `signer` when the copy is first serialized.
    pub fn sign<S>(&mut self, signer: S) -> &mut Self
    where
        S: TransactionSigner + 'static,
    {
        let public_key = signer.public_key();
        let signer = Arc::new(signer);
        self.sign_with(public_key, Arc::new(move |body: &[u8]| signer.sign(body)))
    }

    /// Registers a deferred signer for `public_key`, replacing any signature
    /// or signer previously present for that key.
    pub fn sign_with(&mut self, public_key: PublicKey, signer: SignerFn) -> &mut Self {
        self.assembler.sign_with(public_key, signer);
        self
    }

    /// Whether `public_key` holds a signature or a registered signer.
    pub fn is_signed_by(&self, public_key: &PublicKey) -> bool {
        self.assembler.is_signed_by(public_key)
    }

    /// Adds a precomputed signature for `public_key`.
    ///
    /// Only valid on a frozen transaction targeting a single node, since the
    /// signature covers one node-specific body. Replaces any existing entry
    /// for that key.
    pub fn add_signature(
        &mut self,
        public_key: PublicKey,
        signature: Vec<u8>,
    ) -> Result<&mut Self, TransactionError> {
        self.require_frozen()?;
        if self.copies.len() != 1 {
            return Err(SigningError::MultipleNodeCopies {
                copies: self.copies.len(),
            }
            .into());
        }
        self.assembler.add_signature(0, public_key, signature);
        self.id_locked = true;
        Ok(self)
    }

    /// Adds a precomputed signature to the copy addressed to `node_account_id`.
    pub fn add_signature_for(
        &mut self,
        public_key: PublicKey,
        signature: Vec<u8>,
        transaction_id: TransactionId,
        node_account_id: AccountId,
    ) -> Result<&mut Self, TransactionError> {
        self.require_frozen()?;
        let copy = match self.transaction_id {
            Some(id) if id == transaction_id => self.copy_index(&node_account_id),
            _ => None,
        }
        .ok_or(SigningError::NoMatchingCopy {
            transaction_id,
            node_account_id,
        })?;

        self.assembler.add_signature(copy, public_key, signature);
        self.id_locked = true;
        Ok(self)
    }

    /// Materialized signatures per node. Deferred signers that have not run yet
    /// are not included.
    pub fn signatures(&self) -> BTreeMap<AccountId, BTreeMap<PublicKey, Vec<u8>>> {
        self.copies
            .iter()
            .enumerate()
            .map(|(index, copy)| {
                let signatures = self
                    .assembler
                    .map(index)
                    .map(SignatureMap::signatures)
                    .unwrap_or_default();
                (copy.node_account_id, signatures)
            })
            .collect()
    }

    /// Body bytes of every copy, for signing outside of this process.
    pub fn signable_node_body_bytes(&self) -> Result<Vec<SignableNodeBody>, TransactionError> {
        let transaction_id = self.require_frozen()?;
        Ok(self
            .copies
            .iter()
            .map(|copy| SignableNodeBody {
                node_account_id: copy.node_account_id,
                transaction_id,
                body: copy.body_bytes.clone(),
            })
            .collect())
    }

    pub fn copy_index(&self, node_account_id: &AccountId) -> Option<usize> {
        self.copies
            .iter()
            .position(|copy| copy.node_account_id == *node_account_id)
    }

    /// Resolves the signatures of one copy and returns it ready to send.
    pub fn signed_copy(&mut self, copy: usize) -> Result<SignedTransaction, TransactionError> {
        self.require_frozen()?;
        let body_bytes = self
            .copies
            .get(copy)
            .map(|copy| copy.body_bytes.clone())
            .ok_or_else(|| TransactionError::Validation(format!("no node copy {copy}")))?;
        let signatures = self.assembler.resolve(copy, &body_bytes);
        Ok(SignedTransaction {
            body_bytes,
            signatures,
        })
    }

    /// Hash of the copy addressed to `node_account_id`.
    pub fn transaction_hash_for(&mut self, node_account_id: &AccountId) -> Result<Vec<u8>, TransactionError> {
        let copy = self.copy_index(node_account_id).ok_or_else(|| {
            TransactionError::Validation(format!("no node copy for {node_account_id}"))
        })?;
        self.signed_copy(copy)?.hash()
    }

    /// Serializes every signed copy, resolving deferred signatures.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>, TransactionError> {
        let transaction_id = self.require_frozen()?;
        let entries = (0..self.copies.len())
            .map(|index| {
                Ok(TransactionListEntry {
                    transaction_id,
                    node_account_id: self.copies[index].node_account_id,
                    signed: self.signed_copy(index)?,
                })
            })
            .collect::<Result<Vec<_>, TransactionError>>()?;
        Ok(bincode::serialize(&entries)?)
    }

    /// Rebuilds a frozen transaction from [`Transaction::to_bytes`] output.
    ///
    /// The id of a decoded transaction is locked since its signatures were
    /// produced elsewhere.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TransactionError> {
        let entries: Vec<TransactionListEntry> = bincode::deserialize(bytes)
            .map_err(|e| TransactionError::Decoding(e.to_string()))?;
        let first = entries
            .first()
            .ok_or_else(|| TransactionError::Decoding("empty transaction list".into()))?;
        let transaction_id = first.transaction_id;
        if entries.iter().any(|entry| entry.transaction_id != transaction_id) {
            return Err(TransactionError::Decoding(
                "transaction list mixes transaction ids".into(),
            ));
        }

        let mut node_account_ids = Vec::with_capacity(entries.len());
        let mut copies = Vec::with_capacity(entries.len());
        let mut maps = Vec::with_capacity(entries.len());
        for entry in entries {
            node_account_ids.push(entry.node_account_id);
            copies.push(NodeCopy {
                node_account_id: entry.node_account_id,
                body_bytes: entry.signed.body_bytes,
            });
            maps.push(SignatureMap::from_pairs(entry.signed.signatures));
        }

        Ok(Self {
            transaction_id: Some(transaction_id),
            node_account_ids,
            body: None,
            copies,
            assembler: SignatureAssembler::from_maps(maps),
            id_locked: true,
            regenerate_transaction_id: None,
        })
    }

    /// Whether an expired id may be replaced, given the client default.
    pub fn can_regenerate_id(&self, client_default: bool) -> bool {
        !self.id_locked
            && self.body.is_some()
            && self.regenerate_transaction_id.unwrap_or(client_default)
    }

    /// Replaces the id with a fresh one for the same payer and rebuilds every
    /// copy. Registered signers are re-armed; nothing else survives.
    pub(crate) fn regenerate_id(&mut self) -> Result<TransactionId, TransactionError> {
        let current = self.require_frozen()?;
        let transaction_id = TransactionId::generate(current.account_id);
        self.copies = self.encode_copies(&transaction_id)?;
        self.transaction_id = Some(transaction_id);
        self.assembler.rearm(self.copies.len());
        Ok(transaction_id)
    }

    fn require_frozen(&self) -> Result<TransactionId, TransactionError> {
        match self.transaction_id {
            Some(transaction_id) if self.is_frozen() => Ok(transaction_id),
            _ => Err(TransactionError::Validation(
                "transaction must be frozen".into(),
            )),
        }
    }
}
