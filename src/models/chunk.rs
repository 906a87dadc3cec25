use serde::{Deserialize, Serialize};

use super::TransactionId;

/// Linkage carried by every chunk of a chunked submission.
///
/// `number` is 1-based. Every chunk of one payload shares the
/// `initial_transaction_id` of the first chunk so the ledger can reassemble them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkInfo {
    pub initial_transaction_id: TransactionId,
    pub number: u32,
    pub total: u32,
}

impl ChunkInfo {
    pub fn is_first(&self) -> bool {
        self.number == 1
    }

    pub fn is_last(&self) -> bool {
        self.number == self.total
    }
}
