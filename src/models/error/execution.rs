use std::fmt;
use std::time::Duration;

use thiserror::Error;

use super::{SigningError, TransactionError, TransportError};
use crate::models::{Status, TransactionId};

/// Last failure observed by a retry loop before it gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    Transport(TransportError),
    Status(Status),
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Transport(err) => write!(f, "{err}"),
            AttemptError::Status(status) => write!(f, "node responded {status}"),
        }
    }
}

impl From<TransportError> for AttemptError {
    fn from(err: TransportError) -> Self {
        AttemptError::Transport(err)
    }
}

/// Formats an optional last error for error messages.
pub struct LastError<'a>(pub &'a Option<AttemptError>);

impl fmt::Display for LastError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(err) => write!(f, "{err}"),
            None => f.write_str("none"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Transaction {transaction_id} failed precheck with status {status}")]
    PrecheckStatus {
        status: Status,
        transaction_id: TransactionId,
    },

    #[error("Exhausted {attempts} attempts; last error: {}", LastError(.last_error))]
    MaxAttemptsExceeded {
        attempts: u32,
        last_error: Option<AttemptError>,
    },

    #[error("Request timed out after {elapsed:?}; last error: {}", LastError(.last_error))]
    RequestTimeout {
        elapsed: Duration,
        last_error: Option<AttemptError>,
    },

    #[error("Receipt for {transaction_id} unavailable after waiting {waited:?}")]
    ReceiptUnavailable {
        transaction_id: TransactionId,
        waited: Duration,
    },

    #[error("Transaction {transaction_id} reached consensus with failure status {status}")]
    ReceiptStatus {
        status: Status,
        transaction_id: TransactionId,
    },

    #[error("Execution cancelled")]
    Cancelled,

    #[error("No nodes available for execution")]
    NoNodesAvailable,

    #[error("No async runtime available for blocking execution")]
    NoRuntime,

    #[error("Signing error: {0}")]
    Signing(#[from] SigningError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),
}

impl ExecutionError {
    /// Returns `true` when the outcome of the transaction is not known.
    ///
    /// **Undetermined:**
    /// - `MaxAttemptsExceeded`: an earlier attempt may have reached a node
    /// - `RequestTimeout`: same as above, the budget ran out first
    /// - `ReceiptUnavailable`: the transaction was accepted, consensus unknown
    /// - `Cancelled`: the caller stopped the loop, earlier attempts may have landed
    ///
    /// **Definitive:** every other variant.
    pub fn is_undetermined(&self) -> bool {
        matches!(
            self,
            ExecutionError::MaxAttemptsExceeded { .. }
                | ExecutionError::RequestTimeout { .. }
                | ExecutionError::ReceiptUnavailable { .. }
                | ExecutionError::Cancelled
        )
    }

    /// Status reported by the network, if this error carries one.
    pub fn status(&self) -> Option<&Status> {
        match self {
            ExecutionError::PrecheckStatus { status, .. }
            | ExecutionError::ReceiptStatus { status, .. } => Some(status),
            _ => None,
        }
    }
}
