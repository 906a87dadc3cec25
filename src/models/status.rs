//! Network response codes.
//!
//! Both node prechecks and receipts report their outcome as a [`Status`]. The
//! textual form is the SCREAMING_SNAKE_CASE name used by nodes and by the mirror
//! REST API. Codes unknown to this crate are kept verbatim in
//! [`Status::Unrecognized`] instead of failing the parse.

use std::fmt;

use strum::{AsRefStr, EnumString};

#[derive(Clone, Debug, PartialEq, Eq, Hash, EnumString, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Ok,
    Success,
    Busy,
    Unknown,
    ReceiptNotFound,
    RecordNotFound,
    PlatformNotActive,
    PlatformTransactionNotCreated,
    InvalidNodeAccount,
    InvalidNodeAccountId,
    TransactionExpired,
    InvalidTransaction,
    InvalidTransactionStart,
    InvalidTransactionDuration,
    InvalidTransactionId,
    InvalidSignature,
    InvalidSignatureCountMismatchingKey,
    DuplicateTransaction,
    InsufficientPayerBalance,
    InsufficientTxFee,
    InsufficientAccountBalance,
    PayerAccountNotFound,
    InvalidAccountId,
    InvalidFileId,
    InvalidTopicId,
    AccountDeleted,
    FileDeleted,
    Unauthorized,
    KeyRequired,
    NotSupported,
    ThrottledAtConsensus,
    MaxEntitiesInPriceRegimeHaveBeenCreated,
    InvalidChunkNumber,
    InvalidChunkTransactionId,
    MessageSizeTooLarge,
    TransactionOversize,
    MemoTooLong,
    #[strum(default)]
    Unrecognized(String),
}

impl Status {
    /// Returns `true` when a receipt carrying this status has not reached
    /// consensus yet and the query should be repeated.
    pub fn is_receipt_pending(&self) -> bool {
        matches!(
            self,
            Status::Busy
                | Status::Unknown
                | Status::Ok
                | Status::ReceiptNotFound
                | Status::RecordNotFound
                | Status::PlatformNotActive
        )
    }

    /// Returns `true` when a receipt or record query precheck asks the client
    /// to come back later.
    pub fn is_query_precheck_pending(&self) -> bool {
        matches!(
            self,
            Status::Busy
                | Status::Unknown
                | Status::ReceiptNotFound
                | Status::RecordNotFound
                | Status::PlatformNotActive
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Unrecognized(code) => f.write_str(code),
            other => f.write_str(other.as_ref()),
        }
    }
}
