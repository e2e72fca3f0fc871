//! Backend error types.
//!
//! These errors describe failures when talking to the remote attempt service.
//! Defined in `proctor-core` so callers can downcast an `anyhow::Error` and
//! decide whether a failed `start()` is worth retrying without string matching.

use thiserror::Error;

/// Errors that can occur when interacting with the attempt backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend rejected our credentials (HTTP 401/403).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The assessment does not exist (HTTP 404).
    #[error("assessment not found: {0}")]
    NotFound(String),

    /// The backend returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    Network(String),

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    /// Returns `true` if this error is permanent and should not be retried.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            BackendError::Unauthorized(_) | BackendError::NotFound(_)
        )
    }
}

/// Returns `true` if `err` wraps a permanent [`BackendError`].
pub fn is_permanent(err: &anyhow::Error) -> bool {
    err.downcast_ref::<BackendError>()
        .is_some_and(BackendError::is_permanent)
}
