use serde::Serialize;
use thiserror::Error;

/// Failure to complete a call to a consensus node, before any response code
/// was received.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TransportError {
    #[error("Node unavailable: {0}")]
    Unavailable(String),
    #[error("Deadline exceeded")]
    DeadlineExceeded,
    #[error("Node endpoint could not be resolved: {0}")]
    Unresolvable(String),
    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Determines if this error is transient (can retry) or permanent (should fail).
    ///
    /// Every transport failure is attributed to the node, so even `Other` is
    /// retried against a different node. Only an endpoint that cannot be
    /// resolved at all is considered permanent for that node.
    pub fn is_transient(&self) -> bool {
        !matches!(self, TransportError::Unresolvable(_))
    }
}
