//! Node Transport Module
//!
//! Abstracts the RPC primitive used to talk to a single consensus node. The
//! engine only needs three calls: submit a signed transaction, ask for a
//! receipt and ask for a record. Wire encoding and channel management belong
//! to the implementation.

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::models::{
    NodeEntry, Status, TransactionId, TransactionReceipt, TransactionRecord, TransportError,
};

/// Answer of a node to a submission, before consensus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrecheckResponse {
    pub status: Status,
}

impl PrecheckResponse {
    pub fn new(status: Status) -> Self {
        Self { status }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceiptResponse {
    /// Status of the query itself.
    pub precheck: Status,
    pub receipt: Option<TransactionReceipt>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordResponse {
    /// Status of the query itself.
    pub precheck: Status,
    pub record: Option<TransactionRecord>,
}

/// A trait that abstracts calls to a consensus node.
///
/// Every call must give up once `deadline` has elapsed. The engine wraps each
/// call in its own timeout as well and reports
/// [`TransportError::DeadlineExceeded`] when it fires.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait NodeTransport: Send + Sync {
    /// Submits signed transaction bytes to `node`.
    async fn submit_transaction(
        &self,
        node: &NodeEntry,
        request: Vec<u8>,
        deadline: Duration,
    ) -> Result<PrecheckResponse, TransportError>;

    /// Queries `node` for the receipt of `transaction_id`.
    async fn get_receipt(
        &self,
        node: &NodeEntry,
        transaction_id: &TransactionId,
        deadline: Duration,
    ) -> Result<ReceiptResponse, TransportError>;

    /// Queries `node` for the record of `transaction_id`.
    async fn get_record(
        &self,
        node: &NodeEntry,
        transaction_id: &TransactionId,
        deadline: Duration,
    ) -> Result<RecordResponse, TransportError>;
}
