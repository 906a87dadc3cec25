use serde::Serialize;
use thiserror::Error;

use super::SigningError;

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TransactionError {
    #[error("Transaction has no candidate nodes")]
    NoNodes,
    #[error("Transaction body encoding error: {0}")]
    Encoding(String),
    #[error("Invalid transaction bytes: {0}")]
    Decoding(String),
    #[error("Signing error: {0}")]
    Signing(#[from] SigningError),
    #[error("Invalid transaction: {0}")]
    Validation(String),
}

impl From<bincode::Error> for TransactionError {
    fn from(err: bincode::Error) -> Self {
        TransactionError::Encoding(err.to_string())
    }
}
