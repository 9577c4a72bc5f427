//! Caller context extraction.
//!
//! Verifies the bearer token, then loads the caller's role from the store.
//! The resulting [`Actor`] is inserted as a request extension for handlers.

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::auth::{Actor, IdentityVerifier};
use crate::error::ApiError;
use crate::store::Store;

#[derive(Clone)]
pub struct AuthState {
    pub verifier: Arc<IdentityVerifier>,
    pub store: Arc<dyn Store>,
}

impl AuthState {
    pub fn new(verifier: Arc<IdentityVerifier>, store: Arc<dyn Store>) -> Self {
        Self { verifier, store }
    }
}

fn unauthorized(message: &str, code: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(ApiError::new(message, code))).into_response()
}

fn actor_from_header(state: &AuthState, value: &HeaderValue) -> Result<Actor, Response> {
    let token = value
        .to_str()
        .ok()
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| unauthorized("Invalid authorization header format", "INVALID_AUTH_FORMAT"))?;

    let identity = state.verifier.verify(token).map_err(|e| {
        debug!(error = %e, "Rejected identity token");
        unauthorized("Invalid or expired token", "INVALID_TOKEN")
    })?;

    let role = state
        .store
        .user_role(identity.user_id)
        .map_err(IntoResponse::into_response)?
        .ok_or_else(|| {
            warn!(user_id = %identity.user_id, "Token for unknown user");
            unauthorized("Unknown user", "UNKNOWN_USER")
        })?;

    Ok(Actor::user(identity.user_id, role))
}

/// `None` when the request carries no Authorization header at all.
fn resolve_actor(state: &AuthState, req: &Request) -> Option<Result<Actor, Response>> {
    req.headers()
        .get(header::AUTHORIZATION)
        .map(|value| actor_from_header(state, value))
}

/// Rejects requests without a valid caller.
pub async fn require_caller(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let actor = match resolve_actor(&state, &req) {
        Some(result) => result?,
        None => {
            return Err(unauthorized(
                "Missing authorization header",
                "MISSING_AUTH_HEADER",
            ))
        }
    };

    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}

/// Like [`require_caller`], but a request without credentials proceeds as
/// [`Actor::Anonymous`]. Invalid credentials are still rejected.
pub async fn optional_caller(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let actor = match resolve_actor(&state, &req) {
        Some(result) => result?,
        None => Actor::Anonymous,
    };

    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}
