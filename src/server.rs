//! HTTP surface of the verifier
//!
//! - `GET /nonce` - issue a nonce, `{"id","value"}`
//! - `POST /verify` - verify a compact token sent as the raw request body, `{"ok","message"}`
//! - `GET /health` - liveness and store occupancy

use crate::{
    auth::{AuthService, VerificationOutcome},
    crypto::jwt::NonceClaim,
    error::{AuthError, NonceError},
};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Body returned by `/verify`, and by `/nonce` when no nonce can be issued
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub ok: bool,
    pub message: String,
}

/// Health check response
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub outstanding_nonces: usize,
}

/// Shared application state
#[derive(Clone, Debug)]
pub struct AppState {
    pub auth: AuthService,
}

/// Error raised while issuing a nonce
#[derive(Debug)]
pub struct IssueError(NonceError);

impl IntoResponse for IssueError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            NonceError::ResourceExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::error!(error = %self.0, "nonce issuance failed");
        let body = VerifyResponse { ok: false, message: self.0.to_string() };
        (status, Json(body)).into_response()
    }
}

/// Nonce endpoint
///
/// GET /nonce
pub async fn issue_nonce(State(state): State<Arc<AppState>>) -> Result<Json<NonceClaim>, IssueError> {
    let nonce = state.auth.issue_nonce().map_err(IssueError)?;
    Ok(Json(nonce.into()))
}

/// Verification endpoint
///
/// POST /verify
///
/// The body is treated as opaque text; surrounding whitespace is ignored.
pub async fn verify(State(state): State<Arc<AppState>>, body: Bytes) -> (StatusCode, Json<VerifyResponse>) {
    let outcome = match std::str::from_utf8(&body) {
        Ok(raw) => state.auth.verify(raw.trim()),
        Err(e) => {
            tracing::warn!(error = %e, "token body is not UTF-8");
            VerificationOutcome::Rejected(AuthError::Malformed(format!("body is not UTF-8: {e}")))
        }
    };
    let status = if outcome.accepted() { StatusCode::OK } else { StatusCode::BAD_REQUEST };
    (status, Json(VerifyResponse { ok: outcome.accepted(), message: outcome.reason() }))
}

/// Health check endpoint
///
/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        outstanding_nonces: state.auth.nonces().len(),
    })
}

/// Create the API router
pub fn create_router(auth: AuthService) -> Router {
    let state = Arc::new(AppState { auth });
    Router::new()
        .route("/nonce", get(issue_nonce))
        .route("/verify", post(verify))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the verifier on `listener` until ctrl-c is received
pub async fn serve(listener: TcpListener, auth: AuthService) -> std::io::Result<()> {
    axum::serve(listener, create_router(auth))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for ctrl-c, serving until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("received ctrl-c, shutting down");
}
