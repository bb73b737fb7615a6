//! Error types for ledger operations.

use std::time::Duration;

use thiserror::Error;

/// Errors talking to the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The node answered but refused the request.
    #[error("ledger rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The node could not be reached or the connection failed.
    #[error("ledger transport error: {0}")]
    Transport(String),

    /// An attempt did not finish within the request timeout.
    #[error("ledger request timed out after {0:?}")]
    Timeout(Duration),

    /// A request or response could not be (de)serialized.
    #[error("ledger serialization error: {0}")]
    Serialization(String),

    /// The address belongs to a network this client does not know.
    #[error("unsupported network: {0}")]
    UnsupportedNetwork(String),
}

impl LedgerError {
    /// Whether resubmitting the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Transport(_) | LedgerError::Timeout(_) => true,
            LedgerError::Rejected { status, .. } => *status == 429 || *status >= 500,
            LedgerError::Serialization(_) | LedgerError::UnsupportedNetwork(_) => false,
        }
    }
}

impl From<reqwest::Error> for LedgerError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            LedgerError::Serialization(e.to_string())
        } else {
            LedgerError::Transport(e.to_string())
        }
    }
}

impl From<auditchain_core::CoreError> for LedgerError {
    fn from(e: auditchain_core::CoreError) -> Self {
        match e {
            auditchain_core::CoreError::UnsupportedNetwork(n) => LedgerError::UnsupportedNetwork(n),
            other => LedgerError::Serialization(other.to_string()),
        }
    }
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
