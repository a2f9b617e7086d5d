//! Verification error types.

use thiserror::Error;

use super::session::SessionKey;

/// Result type for verification operations.
pub type VerifyResult<T> = Result<T, VerifyError>;

/// Errors surfaced by the verification workflow.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// No session stored under the key. The operator has to start over.
    #[error("No verification session for '{key}'; please restart verification")]
    SessionNotFound { key: SessionKey },

    /// Event does not fit the session's current state.
    #[error("Illegal event: {0}")]
    IllegalEvent(#[from] IllegalEvent),

    /// Session store failure.
    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    /// Issue ledger could not be written.
    #[error("Failed to write issue ledger: {0}")]
    Ledger(#[source] std::io::Error),
}

impl VerifyError {
    /// Whether the caller should restart verification from scratch.
    pub fn needs_restart(&self) -> bool {
        matches!(self, Self::SessionNotFound { .. })
    }
}

/// An event received in a state that cannot accept it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IllegalEvent {
    /// Severity arrived but no fail/partial result is waiting for one.
    #[error("severity given but no result is awaiting a severity")]
    NoPendingSeverity,

    /// A result arrived for a test other than the current one.
    #[error("result for test {received} but test {expected} is current")]
    IndexMismatch { expected: usize, received: usize },

    /// A result arrived while the previous one still needs a severity.
    #[error("test {index} is still awaiting a severity")]
    AwaitingSeverity { index: usize },

    /// Every test already has a result.
    #[error("session is already complete")]
    SessionComplete,

    /// Finalize was requested before every test had a result.
    #[error("session still has {remaining} test(s) without a result")]
    SessionIncomplete { remaining: usize },
}

/// Session persistence errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored record is not valid JSON.
    #[error("Invalid session record: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Checklist generation errors.
#[derive(Debug, Error)]
pub enum ChecklistError {
    /// The generator's response did not have the expected shape.
    #[error("Parse failure: {0}")]
    ParseFailure(String),
}
