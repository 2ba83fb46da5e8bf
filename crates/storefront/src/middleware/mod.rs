//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transaction)
//! 2. `TraceLayer` (request span with `request_id` and `user_id` fields)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers (CSP, frame and isolation policies)
//! 5. Session layer (tower-sessions with `PostgreSQL` store, cart only)
//! 6. Shield (bot detection)
//! 7. Session guard (JWT verification, silent refresh, route access)
//! 8. CSRF (token header for the API, origin check for forms)
//! 9. Rate limiting (governor) on the auth and API routers

pub mod access;
pub mod auth;
pub mod cookies;
pub mod csrf;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;
pub mod session_guard;
pub mod shield;

pub use auth::{OptionalUser, RequireAdmin, RequireUser};
pub use csrf::{CSRF_HEADER, csrf_middleware};
pub use rate_limit::{api_rate_limiter, auth_rate_limiter, client_ip};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
pub use session_guard::session_guard_middleware;
pub use shield::{shield_middleware, user_agent};
