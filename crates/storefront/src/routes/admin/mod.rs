//! Admin panel route handlers.
//!
//! Everything under `/admin` is reachable only by admins: the session guard
//! redirects customers home and anonymous visitors to the login page, and
//! each handler also takes [`RequireAdmin`](crate::middleware::RequireAdmin).
//!
//! ```text
//! GET  /admin                          - Dashboard
//! GET  /admin/products                 - Product list (active and inactive)
//! GET  /admin/products/new             - New product form
//! POST /admin/products                 - Create product
//! GET  /admin/products/{id}/edit       - Edit product form
//! POST /admin/products/{id}            - Update product
//! POST /admin/products/{id}/delete     - Delete product
//! GET  /admin/orders                   - Order list, filter by status
//! GET  /admin/orders/{id}              - Order detail
//! POST /admin/orders/{id}/status       - Move an order to its next status
//! GET  /admin/coupons                  - Coupon list
//! GET  /admin/coupons/new              - New coupon form
//! POST /admin/coupons                  - Create coupon
//! GET  /admin/coupons/{id}/edit        - Edit coupon form
//! POST /admin/coupons/{id}             - Update coupon
//! POST /admin/coupons/{id}/delete      - Delete coupon
//! GET  /admin/users                    - User list
//! POST /admin/users/{id}/role          - Change a user's role
//! GET  /admin/reviews                  - Recent reviews
//! POST /admin/reviews/{id}/delete      - Remove a review
//! ```

pub mod coupons;
pub mod dashboard;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod users;

use std::str::FromStr;

use axum::{
    Router,
    routing::{get, post},
};
use serde::Deserialize;

use crate::state::AppState;

/// Rows per admin list page.
pub const ADMIN_PAGE_SIZE: u32 = 50;

/// `?page=` for admin lists.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
}

impl PageQuery {
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        crate::db::page_offset(self.page(), ADMIN_PAGE_SIZE)
    }
}

/// Parse a required form field.
///
/// # Errors
///
/// Returns a message naming the field if it is blank or malformed.
pub fn required<T: FromStr>(value: &str, label: &str) -> Result<T, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(format!("{label} is required"));
    }
    value.parse().map_err(|_| format!("{label} is not valid"))
}

/// Parse an optional form field; blank means absent.
///
/// # Errors
///
/// Returns a message naming the field if it is present but malformed.
pub fn optional<T: FromStr>(value: &str, label: &str) -> Result<Option<T>, String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value.parse().map(Some).map_err(|_| format!("{label} is not valid"))
}

/// HTML checkboxes are only submitted when ticked.
#[must_use]
pub fn checked(value: Option<&str>) -> bool {
    matches!(value, Some("on" | "true" | "1"))
}

/// Create the admin panel router, mounted at `/admin`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard::index))
        .route("/products", get(products::index).post(products::create))
        .route("/products/new", get(products::new_product))
        .route("/products/{id}", post(products::update))
        .route("/products/{id}/edit", get(products::edit))
        .route("/products/{id}/delete", post(products::delete))
        .route("/orders", get(orders::index))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/status", post(orders::update_status))
        .route("/coupons", get(coupons::index).post(coupons::create))
        .route("/coupons/new", get(coupons::new_coupon))
        .route("/coupons/{id}", post(coupons::update))
        .route("/coupons/{id}/edit", get(coupons::edit))
        .route("/coupons/{id}/delete", post(coupons::delete))
        .route("/users", get(users::index))
        .route("/users/{id}/role", post(users::update_role))
        .route("/reviews", get(reviews::index))
        .route("/reviews/{id}/delete", post(reviews::delete))
}
