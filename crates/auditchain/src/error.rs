//! Error types for the audit service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use auditchain_auth::AuthError;
use auditchain_core::{Address, ClassifyError, CoreError, ValidationError};
use auditchain_ledger::LedgerError;
use auditchain_store::StoreError;

/// Errors surfaced by the service and its HTTP layer.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Authentication or authorization failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The log request could not be classified.
    #[error(transparent)]
    Classify(#[from] ClassifyError),

    /// The request body could not be read or parsed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The subject has no event chain.
    #[error("no event chain found for {0}")]
    NotFound(Address),

    /// Anchoring was requested for a chain without events.
    #[error("event chain for {0} is empty, cannot anchor")]
    EmptyChain(Address),

    /// A concurrent writer changed the chain or cursor first. Safe to retry.
    #[error("concurrent update: {0}")]
    Conflict(String),

    /// The ledger failed or refused the call.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("storage error: {0}")]
    Store(StoreError),

    #[error(transparent)]
    Core(#[from] CoreError),

    /// A stored chain failed verification.
    #[error("stored chain is corrupt: {0}")]
    Corrupt(#[from] ValidationError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        if e.is_conflict() {
            ServiceError::Conflict(e.to_string())
        } else {
            ServiceError::Store(e)
        }
    }
}

impl ServiceError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Auth(AuthError::NotAuthorized(_)) => StatusCode::FORBIDDEN,
            ServiceError::Auth(AuthError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Auth(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Classify(_) | ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) | ServiceError::EmptyChain(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Ledger(e) if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Ledger(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Store(_)
            | ServiceError::Core(_)
            | ServiceError::Corrupt(_)
            | ServiceError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn summary(&self) -> &'static str {
        match self {
            ServiceError::Auth(_) => "Signature verification failed",
            ServiceError::Classify(_) | ServiceError::BadRequest(_) => "Invalid log request",
            ServiceError::NotFound(_) | ServiceError::EmptyChain(_) => "Event chain not found",
            ServiceError::Conflict(_) => "Concurrent update, retry the request",
            ServiceError::Ledger(_) => "Ledger unavailable",
            _ => "Internal error",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let reason = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            "internal error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "message": self.summary(),
            "error": reason,
        }));

        (status, body).into_response()
    }
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use auditchain_core::{Keypair, NetworkId};

    fn address() -> Address {
        Address::derive(NetworkId::TESTNET, &Keypair::from_seed(&[2; 32]).public_key())
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ServiceError::Auth(AuthError::InvalidSignature("x".into())), 401),
            (ServiceError::Auth(AuthError::MalformedIdentity("x".into())), 401),
            (ServiceError::Auth(AuthError::NotAuthorized("x".into())), 403),
            (ServiceError::Classify(ClassifyError::UnsupportedLogType("X".into())), 400),
            (ServiceError::NotFound(address()), 404),
            (ServiceError::Conflict("x".into()), 409),
            (ServiceError::Ledger(LedgerError::Transport("x".into())), 503),
            (
                ServiceError::Ledger(LedgerError::Rejected {
                    status: 400,
                    message: "x".into(),
                }),
                502,
            ),
            (ServiceError::Store(StoreError::NotFound("k".into())), 500),
        ];
        for (err, status) in cases {
            assert_eq!(err.status().as_u16(), status, "{err}");
        }
    }

    #[test]
    fn test_store_conflict_becomes_conflict() {
        let err: ServiceError = StoreError::CursorConflict {
            subject: address().to_string(),
        }
        .into();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_internal_errors_hide_details() {
        let err = ServiceError::Store(StoreError::InvalidData("event_chains row 7".into()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("event_chains"));
        assert!(text.contains("internal error"));
    }
}
