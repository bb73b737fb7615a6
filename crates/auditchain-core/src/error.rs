//! Error types for auditchain core.

use thiserror::Error;

use crate::crypto::Blake3Hash;

/// Core errors that can occur while building identities, events and chains.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("malformed address: {0}")]
    MalformedAddress(String),

    #[error("unsupported network: {0}")]
    UnsupportedNetwork(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("content hash does not match event content")]
    ContentHashMismatch,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),

    /// An anchor cursor points at a hash that is not part of the chain.
    #[error("cursor {0} is not part of this chain")]
    UnknownCursor(Blake3Hash),
}

/// Integrity failures found while verifying a stored chain.
///
/// `index` is the zero-based position of the first offending event.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("content hash mismatch at event {index}")]
    ContentHashMismatch { index: usize },

    #[error("broken link at event {index}: expected previous {expected:?}, got {got:?}")]
    BrokenLink {
        index: usize,
        expected: Blake3Hash,
        got: Blake3Hash,
    },

    #[error("signature verification failed at event {index}")]
    SignatureFailed { index: usize },

    #[error("structural error: {0}")]
    StructuralError(String),
}

/// Errors from the log type classifier.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("unsupported log type: {0}")]
    UnsupportedLogType(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("encoding error: {0}")]
    Encoding(String),
}

impl From<CoreError> for ValidationError {
    fn from(e: CoreError) -> Self {
        ValidationError::StructuralError(e.to_string())
    }
}
