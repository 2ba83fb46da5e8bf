//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                               - Home page
//! GET  /health                         - Liveness
//! GET  /health/ready                   - Readiness (database ping)
//!
//! # Catalog
//! GET  /products                       - Product listing (?q, category, sort, page)
//! GET  /products/{slug}                - Product detail with reviews
//! POST /products/{slug}/reviews        - Review a product (signed in)
//!
//! # Cart
//! GET  /cart                           - Cart page
//! POST /cart/add                       - Add a product
//! POST /cart/update                    - Change a quantity (0 removes)
//! POST /cart/remove                    - Remove a line
//! POST /cart/coupon                    - Apply a coupon
//! POST /cart/coupon/remove             - Drop the coupon
//!
//! # Checkout (signed in)
//! GET  /checkout                       - Shipping and review
//! POST /checkout                       - Place the order
//!
//! # Account (signed in)
//! GET  /account                        - Profile, orders, default address
//! POST /account/profile                - Change display name
//! GET  /account/addresses              - Saved addresses
//! POST /account/addresses              - Save an address
//! GET  /account/addresses/new          - New address form
//! POST /account/addresses/{id}         - Update an address
//! GET  /account/addresses/{id}/edit    - Edit address form
//! POST /account/addresses/{id}/default - Make default
//! POST /account/addresses/{id}/delete  - Delete
//! GET  /orders/{id}                    - Order detail
//!
//! # Auth
//! GET  /login                          - Login page (guests only)
//! POST /login                          - Sign in (rate limited)
//! GET  /register                       - Registration page (guests only)
//! POST /register                       - Create an account (rate limited, shielded)
//! POST /logout                         - Sign out
//! POST /preferences/theme              - Remember light/dark/system
//!
//! # Admin and API
//! /admin/...                           - See [`admin`]
//! /api/...                             - See [`api`]
//! ```

pub mod account;
pub mod admin;
pub mod api;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod home;
pub mod preferences;
pub mod products;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};

use crate::middleware::auth_rate_limiter;
use crate::state::AppState;

/// Create the auth page routes. Form posts share one rate limiter.
pub fn auth_routes() -> Router<AppState> {
    let limit = auth_rate_limiter();
    Router::new()
        .route(
            "/login",
            get(auth::login_page).merge(post(auth::login).layer(limit.clone())),
        )
        .route(
            "/register",
            get(auth::register_page).merge(post(auth::register).layer(limit)),
        )
        .route("/logout", post(auth::logout))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{slug}", get(products::show))
        .route("/{slug}/reviews", post(products::create_review))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/coupon", post(cart::apply_coupon))
        .route("/coupon/remove", post(cart::remove_coupon))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::index))
        .route("/profile", post(account::update_profile))
        .route(
            "/addresses",
            get(account::addresses).post(account::create_address),
        )
        .route("/addresses/new", get(account::new_address))
        .route("/addresses/{id}", post(account::update_address))
        .route("/addresses/{id}/edit", get(account::edit_address))
        .route("/addresses/{id}/default", post(account::set_default_address))
        .route("/addresses/{id}/delete", post(account::delete_address))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .route("/checkout", get(checkout::show).post(checkout::place))
        .nest("/account", account_routes())
        .route("/orders/{id}", get(account::order))
        .merge(auth_routes())
        .route("/preferences/theme", post(preferences::set_theme))
        .nest("/admin", admin::router())
        .nest("/api", api::router())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
