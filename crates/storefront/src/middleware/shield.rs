//! Request shield middleware: turns automated clients away before routing.
//!
//! Signup checks (rate limit, email screening) run in the registration
//! handlers through [`crate::services::protection::Shield::protect_signup`].

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::access::has_segment_prefix;
use super::rate_limit::client_ip;
use crate::error::AppError;
use crate::state::AppState;

/// Monitoring probes and assets are never screened.
const UNSCREENED: &[&str] = &["/static", "/health"];

/// The `User-Agent` header, if it is valid text.
#[must_use]
pub fn user_agent(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::USER_AGENT).and_then(|v| v.to_str().ok())
}

/// Deny requests from bots (per the shield mode).
pub async fn shield_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path();
    if UNSCREENED.iter().any(|prefix| has_segment_prefix(path, prefix)) {
        return next.run(request).await;
    }

    let ip = client_ip(request.headers(), request.extensions());
    let verdict = state
        .shield()
        .protect_request(ip, user_agent(request.headers()), request.method());

    match verdict {
        Ok(()) => next.run(request).await,
        Err(denial) => AppError::Shield(denial).into_response(),
    }
}
