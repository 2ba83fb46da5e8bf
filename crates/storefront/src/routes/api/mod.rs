//! JSON API.
//!
//! ```text
//! GET    /api/auth/session                 - Session state for the page script
//! POST   /api/auth/login                   - Sign in (rate limited)
//! POST   /api/auth/register                - Create an account (rate limited, shielded)
//! POST   /api/auth/refresh                 - Rotate tokens (rate limited)
//! POST   /api/auth/logout                  - Sign out (rate limited)
//!
//! GET    /api/products                     - Catalog page
//! GET    /api/products/{slug}              - Product
//! GET    /api/products/{slug}/reviews      - Reviews with summary
//! POST   /api/products/{slug}/reviews      - Review a product (signed in)
//!
//! GET    /api/cart                         - Cart with totals
//! POST   /api/cart/items                   - Add a product
//! PUT    /api/cart/items/{product_id}      - Set quantity (0 removes)
//! DELETE /api/cart/items/{product_id}      - Remove a line
//! POST   /api/cart/coupon                  - Apply a coupon
//! DELETE /api/cart/coupon                  - Drop the coupon
//! POST   /api/coupons/validate             - Check a coupon without applying it
//!
//! GET    /api/account                      - Profile and addresses (signed in)
//! GET    /api/orders                       - Order history (signed in)
//! POST   /api/orders                       - Place the cart as an order (signed in)
//! GET    /api/orders/{id}                  - Order with lines (signed in)
//! POST   /api/checkout                     - Same as `POST /api/orders`
//!
//! GET    /api/admin/stats                  - Store totals (admin)
//! GET    /api/admin/orders                 - All orders (admin)
//! PATCH  /api/admin/orders/{id}/status     - Move an order along (admin)
//! ```
//!
//! State-changing calls need the `CSRF-Token` header.

pub mod admin;
pub mod auth;
pub mod cart;
pub mod orders;
pub mod products;

use axum::{
    Router,
    routing::{get, patch, post, put},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

fn auth_routes() -> Router<AppState> {
    let limit = auth_rate_limiter();
    Router::new()
        .route("/session", get(auth::session))
        .route("/login", post(auth::login).layer(limit.clone()))
        .route("/register", post(auth::register).layer(limit.clone()))
        .route("/refresh", post(auth::refresh).layer(limit.clone()))
        .route("/logout", post(auth::logout).layer(limit))
}

/// The `/api` router, rate limited per client IP.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes())
        .route("/products", get(products::list))
        .route("/products/{slug}", get(products::show))
        .route(
            "/products/{slug}/reviews",
            get(products::reviews).post(products::create_review),
        )
        .route("/cart", get(cart::show))
        .route("/cart/items", post(cart::add_item))
        .route(
            "/cart/items/{product_id}",
            put(cart::set_quantity).delete(cart::remove_item),
        )
        .route(
            "/cart/coupon",
            post(cart::apply_coupon).delete(cart::remove_coupon),
        )
        .route("/coupons/validate", post(cart::validate_coupon))
        .route("/account", get(orders::account))
        .route("/orders", get(orders::list).post(orders::place))
        .route("/checkout", post(orders::place))
        .route("/orders/{id}", get(orders::show))
        .route("/admin/stats", get(admin::stats))
        .route("/admin/orders", get(admin::orders))
        .route("/admin/orders/{id}/status", patch(admin::update_status))
        .layer(api_rate_limiter())
}
