//! Classification of node responses.

use crate::models::Status;

/// What the dispatcher does with a precheck status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    /// Accepted by the node.
    Success,
    /// The network is busy; back off and retry on another node.
    Retry,
    /// The node itself is not able to process transactions; mark it unhealthy,
    /// back off and retry elsewhere.
    ServerError,
    /// The node is not reachable under the account the transaction was
    /// addressed to; mark it unhealthy, refresh the address book, rotate.
    NodeMisrouted,
    /// The transaction id is outside its validity window.
    Expired,
    /// The request itself is wrong; retrying cannot help.
    RequestError,
}

impl ExecutionState {
    /// Classifies a submission precheck status.
    ///
    /// **Retried:**
    /// - `BUSY`, `THROTTLED_AT_CONSENSUS`: back off
    /// - `PLATFORM_NOT_ACTIVE`, `PLATFORM_TRANSACTION_NOT_CREATED`: node unhealthy, back off
    /// - `INVALID_NODE_ACCOUNT`, `INVALID_NODE_ACCOUNT_ID`: node unhealthy, refresh, rotate
    /// - `TRANSACTION_EXPIRED`: only when the id may be regenerated
    ///
    /// **Terminal:** every other status, `OK` being success.
    pub fn from_precheck(status: &Status) -> Self {
        match status {
            Status::Ok => ExecutionState::Success,
            Status::Busy | Status::ThrottledAtConsensus => ExecutionState::Retry,
            Status::PlatformNotActive | Status::PlatformTransactionNotCreated => {
                ExecutionState::ServerError
            }
            Status::InvalidNodeAccount | Status::InvalidNodeAccountId => {
                ExecutionState::NodeMisrouted
            }
            Status::TransactionExpired => ExecutionState::Expired,
            _ => ExecutionState::RequestError,
        }
    }
}
