//! Mirror Node Module
//!
//! The mirror node serves historical data over REST. The engine uses it for two
//! things: fetching the current address book when a node reports that it is no
//! longer reachable under the account it was addressed with, and as a fallback
//! source of receipts when no consensus node answers.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::models::{MirrorError, NodeEntry, TransactionId, TransactionReceipt};

mod rest;
pub use rest::*;

/// Receipt lookup result from the mirror node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MirrorReceipt {
    /// The transaction reached consensus with this receipt.
    Final(TransactionReceipt),
    /// The mirror has not ingested the transaction yet.
    Pending,
}

/// A trait that abstracts the mirror node queries used by the engine.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait MirrorNode: Send + Sync {
    /// Fetches the complete current address book.
    async fn query_current_address_book(&self) -> Result<Vec<NodeEntry>, MirrorError>;

    /// Looks up the consensus result of a transaction.
    async fn query_receipt(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<MirrorReceipt, MirrorError>;
}
