//! HTTP surface.
//!
//! Every route under `/events` is signature-gated: the middleware buffers the
//! body, authenticates the request against the address in its path and hands
//! the verified [`Identity`] to the handler. Handlers only ever act on that
//! identity's chain.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{OriginalUri, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use auditchain_auth::{AuthError, RequestAuthenticator, SignedRequest};
use auditchain_core::{Address, Identity, LogInfo, SignedEvent};
use auditchain_ledger::{EntryStatus, LedgerClient};
use auditchain_store::{AuthorizationLookup, ChainStore};

use crate::error::{Result, ServiceError};
use crate::service::{AnchorSummary, AuditService, LoggedEvent};

/// Largest request body the middleware buffers.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared state of the router.
pub struct AppState<S, L> {
    pub service: Arc<AuditService<S, L>>,
    pub auth: RequestAuthenticator<S>,
}

impl<S, L> Clone for AppState<S, L> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            auth: self.auth.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LogResponse {
    message: &'static str,
    #[serde(flatten)]
    logged: LoggedEvent,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LogsResponse {
    user_id: Address,
    logs: Vec<SignedEvent>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnchorResponse {
    user_id: Address,
    #[serde(flatten)]
    anchor: AnchorSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyResponse {
    user_id: Address,
    all_committed: bool,
    committed: usize,
    entries: Vec<EntryStatus>,
}

/// Build the router, optionally nested under `route_prefix`.
pub fn build_router<S, L>(state: AppState<S, L>, route_prefix: Option<&str>) -> Router
where
    S: ChainStore + AuthorizationLookup + 'static,
    L: LedgerClient + 'static,
{
    let events = Router::new()
        .route("/events/log", post(log_without_subject))
        .route("/events/:address/log", post(log_event::<S, L>))
        .route("/events/:address/logs", get(logs::<S, L>))
        .route("/events/:address/anchor", post(anchor::<S, L>))
        .route("/events/:address/anchors", get(verify_anchors::<S, L>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_signature::<S, L>,
        ))
        .with_state(state);

    let app = match route_prefix.map(|p| p.trim_end_matches('/')) {
        Some(prefix) if !prefix.is_empty() => {
            let prefix = if prefix.starts_with('/') {
                prefix.to_string()
            } else {
                format!("/{prefix}")
            };
            Router::new().nest(&prefix, events)
        }
        _ => events,
    };

    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn require_signature<S, L>(
    State(state): State<AppState<S, L>>,
    request: Request,
    next: Next,
) -> Result<Response>
where
    S: ChainStore + AuthorizationLookup + 'static,
    L: LedgerClient + 'static,
{
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| ServiceError::BadRequest(format!("cannot read body: {e}")))?;

    // Clients sign the path they sent, before any nesting strips a prefix.
    let uri = parts
        .extensions
        .get::<OriginalUri>()
        .map(|o| o.0.clone())
        .unwrap_or_else(|| parts.uri.clone());
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());

    let mut signed = SignedRequest::new(parts.method.as_str(), target).with_body(body.clone());
    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            signed.insert_header(name.as_str(), value);
        }
    }

    let identity = state.auth.authenticate(&signed).await?;

    let mut request = Request::from_parts(parts, Body::from(body));
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

async fn log_without_subject() -> ServiceError {
    AuthError::MalformedIdentity("the path must name the subject address".into()).into()
}

async fn log_event<S, L>(
    State(state): State<AppState<S, L>>,
    Extension(identity): Extension<Identity>,
    body: Bytes,
) -> Result<Json<LogResponse>>
where
    S: ChainStore + AuthorizationLookup + 'static,
    L: LedgerClient + 'static,
{
    let info: LogInfo = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::BadRequest(format!("invalid log request: {e}")))?;

    let logged = state.service.log_event(&identity, info).await?;
    let message = match logged.anchor {
        AnchorSummary::Anchored { .. } | AnchorSummary::Empty => {
            "Event logged and anchored successfully"
        }
        AnchorSummary::Deferred { .. } | AnchorSummary::Disabled => "Event logged successfully",
    };

    Ok(Json(LogResponse { message, logged }))
}

async fn logs<S, L>(
    State(state): State<AppState<S, L>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<LogsResponse>>
where
    S: ChainStore + AuthorizationLookup + 'static,
    L: LedgerClient + 'static,
{
    let logs = state.service.logs(&identity.address).await?;
    Ok(Json(LogsResponse {
        user_id: identity.address,
        logs,
    }))
}

async fn anchor<S, L>(
    State(state): State<AppState<S, L>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<AnchorResponse>>
where
    S: ChainStore + AuthorizationLookup + 'static,
    L: LedgerClient + 'static,
{
    let outcome = state.service.anchor(&identity.address).await?;
    Ok(Json(AnchorResponse {
        user_id: identity.address,
        anchor: AnchorSummary::from(&outcome),
    }))
}

async fn verify_anchors<S, L>(
    State(state): State<AppState<S, L>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<VerifyResponse>>
where
    S: ChainStore + AuthorizationLookup + 'static,
    L: LedgerClient + 'static,
{
    let report = state.service.verify_anchors(&identity.address).await?;
    Ok(Json(VerifyResponse {
        user_id: identity.address,
        all_committed: report.all_committed(),
        committed: report.committed(),
        entries: report.entries,
    }))
}
