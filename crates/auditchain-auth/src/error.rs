//! Authentication errors.

use thiserror::Error;

use auditchain_store::StoreError;

/// Why a request was not authenticated.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The path carries no well-formed address.
    #[error("malformed identity: {0}")]
    MalformedIdentity(String),

    /// The address belongs to a network this service does not accept.
    #[error("unsupported network: {0}")]
    UnsupportedNetwork(String),

    /// Signature missing, unparsable, or not matching the request.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Valid signature, but the address is not an approved user.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// The authorization lookup itself failed.
    #[error("authorization lookup failed: {0}")]
    Store(#[from] StoreError),
}

/// Result type for authentication.
pub type Result<T> = std::result::Result<T, AuthError>;
