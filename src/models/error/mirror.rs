use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MirrorError {
    #[error("Mirror request timeout")]
    Timeout,
    #[error("Mirror request error (HTTP {status_code}): {error}")]
    RequestError { error: String, status_code: u16 },
    #[error("Invalid mirror response: {0}")]
    InvalidResponse(String),
    #[error("Mirror returned an empty address book")]
    EmptyAddressBook,
    #[error("No mirror node configured")]
    NotConfigured,
    #[error("Other mirror error: {0}")]
    Other(String),
}

impl MirrorError {
    /// Determines if this error is transient (can retry) or permanent (should fail).
    pub fn is_transient(&self) -> bool {
        match self {
            MirrorError::Timeout | MirrorError::Other(_) => true,
            MirrorError::RequestError { status_code, .. } => {
                *status_code == 429 || *status_code >= 500
            }
            MirrorError::InvalidResponse(_)
            | MirrorError::EmptyAddressBook
            | MirrorError::NotConfigured => false,
        }
    }
}

/// Categorizes a reqwest error into an appropriate `MirrorError` variant.
///
/// # Arguments
///
/// * `err` - A reference to the reqwest error to categorize
///
/// # Returns
///
/// The appropriate `MirrorError` variant based on the error type
fn categorize_reqwest_error(err: &reqwest::Error) -> MirrorError {
    if err.is_timeout() {
        return MirrorError::Timeout;
    }

    if let Some(status) = err.status() {
        return MirrorError::RequestError {
            error: err.to_string(),
            status_code: status.as_u16(),
        };
    }

    if err.is_decode() {
        return MirrorError::InvalidResponse(err.to_string());
    }

    MirrorError::Other(err.to_string())
}

impl From<reqwest::Error> for MirrorError {
    fn from(err: reqwest::Error) -> Self {
        categorize_reqwest_error(&err)
    }
}
