//! Transaction body encoding.
//!
//! The engine never looks inside a body. Every transaction type only has to
//! produce the bytes of its body for a given transaction id and node account
//! id, since each node copy embeds the node it is addressed to.

use bytes::Bytes;
use serde::Serialize;

use crate::models::{AccountId, ChunkInfo, TransactionError, TransactionId};

/// Identifies the node copy being encoded.
#[derive(Clone, Copy, Debug)]
pub struct BodyContext<'a> {
    pub transaction_id: &'a TransactionId,
    pub node_account_id: &'a AccountId,
}

/// Capability of a transaction type to encode its body.
pub trait TransactionBody: Send + Sync {
    fn encode(&self, context: &BodyContext<'_>) -> Result<Vec<u8>, TransactionError>;

    /// Short name used in logs.
    fn kind(&self) -> &'static str {
        "transaction"
    }
}

/// Capability of a chunkable transaction type to encode one of its chunks.
pub trait ChunkedBody: Send + Sync {
    fn encode_chunk(
        &self,
        context: &BodyContext<'_>,
        chunk: &ChunkInfo,
        data: &[u8],
    ) -> Result<Vec<u8>, TransactionError>;

    fn kind(&self) -> &'static str {
        "chunked_transaction"
    }
}

/// Body carrying an opaque payload and a memo, encoded with `bincode`.
///
/// Used where the concrete transaction type does not matter to the caller,
/// e.g. for raw payload submissions and in tests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OpaqueBody {
    pub memo: String,
    pub payload: Bytes,
}

#[derive(Serialize)]
struct OpaqueBodyWire<'a> {
    transaction_id: &'a TransactionId,
    node_account_id: &'a AccountId,
    memo: &'a str,
    chunk: Option<&'a ChunkInfo>,
    payload: &'a [u8],
}

impl OpaqueBody {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            memo: String::new(),
            payload: payload.into(),
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }
}

impl TransactionBody for OpaqueBody {
    fn encode(&self, context: &BodyContext<'_>) -> Result<Vec<u8>, TransactionError> {
        Ok(bincode::serialize(&OpaqueBodyWire {
            transaction_id: context.transaction_id,
            node_account_id: context.node_account_id,
            memo: &self.memo,
            chunk: None,
            payload: &self.payload,
        })?)
    }

    fn kind(&self) -> &'static str {
        "opaque"
    }
}

impl ChunkedBody for OpaqueBody {
    /// The payload of the body itself is ignored; `data` carries the chunk.
    fn encode_chunk(
        &self,
        context: &BodyContext<'_>,
        chunk: &ChunkInfo,
        data: &[u8],
    ) -> Result<Vec<u8>, TransactionError> {
        Ok(bincode::serialize(&OpaqueBodyWire {
            transaction_id: context.transaction_id,
            node_account_id: context.node_account_id,
            memo: &self.memo,
            chunk: Some(chunk),
            payload: data,
        })?)
    }

    fn kind(&self) -> &'static str {
        "opaque_chunked"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opaque_body_differs_per_node() {
        let body = OpaqueBody::new(&b"payload"[..]).with_memo("memo");
        let tx_id = TransactionId::generate(AccountId::new(0, 0, 2));
        let node_a = AccountId::new(0, 0, 3);
        let node_b = AccountId::new(0, 0, 4);

        let a = body
            .encode(&BodyContext {
                transaction_id: &tx_id,
                node_account_id: &node_a,
            })
            .unwrap();
        let b = body
            .encode(&BodyContext {
                transaction_id: &tx_id,
                node_account_id: &node_b,
            })
            .unwrap();

        assert_ne!(a, b);
    }
}
