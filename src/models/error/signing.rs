use serde::Serialize;
use thiserror::Error;

use crate::models::{AccountId, TransactionId};

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SigningError {
    #[error(
        "Cannot add a single signature to a transaction with {copies} node copies; \
         target a specific node copy instead"
    )]
    MultipleNodeCopies { copies: usize },
    #[error("No node copy for transaction {transaction_id} and node {node_account_id}")]
    NoMatchingCopy {
        transaction_id: TransactionId,
        node_account_id: AccountId,
    },
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
}
