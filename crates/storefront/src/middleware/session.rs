//! Server-side session for the cart and flash messages.
//!
//! Identity lives in the JWT cookies; the session holds only shopping state,
//! stored in `shopfront.session`.

use sqlx::PgPool;
use tower_sessions::cookie::{SameSite, time};
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::StorefrontConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "sf_session";

/// Carts survive 30 days of inactivity.
const SESSION_INACTIVITY_DAYS: i64 = 30;

/// The session store in the `shopfront` schema.
///
/// # Panics
///
/// Panics if the schema name or table name is invalid (never the case for
/// the hardcoded `shopfront` and `session`).
#[must_use]
pub fn session_store(pool: &PgPool) -> PostgresStore {
    PostgresStore::new(pool.clone())
        .with_schema_name("shopfront")
        .expect("valid schema name")
        .with_table_name("session")
        .expect("valid table name")
}

/// Create the session layer backed by `shopfront.session`.
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &StorefrontConfig,
) -> SessionManagerLayer<PostgresStore> {
    SessionManagerLayer::new(session_store(pool))
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(time::Duration::days(
            SESSION_INACTIVITY_DAYS,
        )))
        .with_secure(config.secure_cookies())
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}
