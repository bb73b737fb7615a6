//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Chain or record (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The chain changed since it was loaded.
    #[error("chain for {subject} is at version {actual}, expected {expected}")]
    VersionConflict {
        subject: String,
        expected: u64,
        actual: u64,
    },

    /// The anchor cursor moved since it was read.
    #[error("anchor cursor for {subject} moved concurrently")]
    CursorConflict { subject: String },

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A lock guarding in-process state was poisoned.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether retrying the whole read-modify-write may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. } | Self::CursorConflict { .. })
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
