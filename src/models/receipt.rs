//! Consensus outcomes of submitted transactions.

use super::{AccountId, NodeId, Status, Timestamp, TransactionId};

/// Outcome of a transaction once it reached (or failed to reach) consensus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub status: Status,
    pub transaction_id: TransactionId,
    pub account_id: Option<AccountId>,
    pub file_id: Option<AccountId>,
    pub topic_id: Option<AccountId>,
    pub topic_sequence_number: Option<u64>,
    /// Node that produced the receipt, when known.
    pub node_id: Option<NodeId>,
}

impl TransactionReceipt {
    pub fn new(transaction_id: TransactionId, status: Status) -> Self {
        Self {
            status,
            transaction_id,
            account_id: None,
            file_id: None,
            topic_id: None,
            topic_sequence_number: None,
            node_id: None,
        }
    }
}

/// Full record of a transaction, fetched after its receipt is final.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionRecord {
    pub receipt: TransactionReceipt,
    pub transaction_hash: Vec<u8>,
    pub consensus_timestamp: Option<Timestamp>,
    pub memo: String,
    pub transaction_fee: u64,
}
