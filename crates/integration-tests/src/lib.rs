//! Integration tests for Shopfront.
//!
//! # Running Tests
//!
//! ```bash
//! # Router-level tests (no database needed)
//! cargo test -p shopfront-integration-tests
//!
//! # Live tests against a running storefront with a migrated database
//! SHOPFRONT_TEST_URL=http://localhost:3000 \
//!     cargo test -p shopfront-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `edge_guard` - Route protection, token inspection, cookie clearing
//! - `csrf` - CSRF header and origin checks
//! - `shield` - Bot screening and health probes
//! - `live_session` - Register, refresh, reuse detection, logout over HTTP
//!
//! The router tests run the full middleware stack with [`tower::ServiceExt::oneshot`]
//! against a pool that points at a closed port, so any request that reaches
//! the database fails fast instead of hanging.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashMap;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, Response, header};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

use shopfront_core::{Email, Role, UserId};
use shopfront_storefront::config::StorefrontConfig;
use shopfront_storefront::models::User;
use shopfront_storefront::services::auth::TokenPair;
use shopfront_storefront::state::AppState;

/// Base URL the test config is built with.
pub const BASE_URL: &str = "http://localhost:3000";

/// A desktop Firefox user agent, classified as human by the shield.
pub const BROWSER_UA: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Nothing listens here.
const UNREACHABLE_DATABASE: &str = "postgres://shopfront@127.0.0.1:1/shopfront";

/// Storefront config for router tests.
///
/// # Panics
///
/// Panics if the fixed test values stop passing config validation.
#[must_use]
pub fn test_config() -> StorefrontConfig {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("SHOPFRONT_DATABASE_URL", UNREACHABLE_DATABASE),
        ("SHOPFRONT_BASE_URL", BASE_URL),
        ("SHOPFRONT_JWT_SECRET", "k7Vq2mZp9XwR4tLb8NcH3yJf6DsGa1Ue"),
    ]);
    StorefrontConfig::from_lookup(|key| vars.get(key).map(|v| (*v).to_string()))
        .expect("test config is valid")
}

/// App state over a lazily connecting pool that never reaches a server.
///
/// # Panics
///
/// Panics if the test database URL does not parse.
#[must_use]
pub fn test_state() -> AppState {
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(500))
        .connect_lazy(UNREACHABLE_DATABASE)
        .expect("test database URL parses");
    AppState::new(test_config(), pool)
}

/// The full application router plus its state.
#[must_use]
pub fn test_app() -> (Router, AppState) {
    let state = test_state();
    (shopfront_storefront::app(state.clone()), state)
}

/// A user that exists only in tokens.
///
/// # Panics
///
/// Panics if `id` makes an unparseable email, which it can't.
#[must_use]
pub fn test_user(id: i32, role: Role) -> User {
    let now = Utc::now();
    User {
        id: UserId::new(id),
        email: Email::parse(&format!("user{id}@shop.test")).expect("test email is valid"),
        name: format!("User {id}"),
        role,
        created_at: now,
        updated_at: now,
    }
}

/// Tokens for `user` as if issued at `issued_at`.
///
/// # Panics
///
/// Panics if signing fails.
#[must_use]
pub fn tokens_at(state: &AppState, user: &User, issued_at: DateTime<Utc>) -> TokenPair {
    state
        .tokens()
        .issue_pair(user, issued_at)
        .expect("token signing works")
}

/// A request that passes the shield: browser user agent and a client IP.
#[must_use]
pub fn browser_request(method: Method, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::USER_AGENT, BROWSER_UA)
        .header("x-forwarded-for", "203.0.113.7")
}

/// `Cookie` header value carrying an access token only.
#[must_use]
pub fn access_cookie(pair: &TokenPair) -> String {
    format!("accessToken={}", pair.access_token)
}

/// Send one request through the router.
///
/// # Panics
///
/// Panics if the router itself errors, which axum routers never do.
pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.expect("router is infallible")
}

/// Collect a response body as JSON.
///
/// # Panics
///
/// Panics if the body is not JSON.
pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body collects");
    serde_json::from_slice(&bytes).expect("body is JSON")
}

/// Every `Set-Cookie` header on a response.
#[must_use]
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_string))
        .collect()
}

/// The `Location` header of a redirect.
#[must_use]
pub fn location(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
}
