//! Cart API.
//!
//! Same session cart as the `/cart` pages, as JSON.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use shopfront_core::ProductId;

use crate::error::{AppError, Result};
use crate::models::session_keys;
use crate::routes::cart::{CartSummary, add_product, apply_coupon_code, load_summary};
use crate::services::cart::{Cart, PricedLine};
use crate::state::AppState;

/// One priced cart line.
#[derive(Debug, Serialize)]
pub struct CartLineView {
    pub product_id: ProductId,
    pub slug: String,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub line_total: Decimal,
    pub in_stock: bool,
}

impl From<&PricedLine> for CartLineView {
    fn from(line: &PricedLine) -> Self {
        Self {
            product_id: line.product.id,
            slug: line.product.slug.clone(),
            name: line.product.name.clone(),
            unit_price: line.product.price,
            quantity: line.quantity,
            line_total: line.line_total,
            in_stock: line.in_stock(),
        }
    }
}

/// The cart with totals.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub item_count: u32,
    pub subtotal: Decimal,
    pub coupon_code: Option<String>,
    /// Why the applied coupon no longer counts.
    pub coupon_error: Option<String>,
    pub discount: Decimal,
    pub total: Decimal,
}

impl From<&CartSummary> for CartView {
    fn from(summary: &CartSummary) -> Self {
        Self {
            lines: summary.priced.lines.iter().map(CartLineView::from).collect(),
            item_count: summary.cart.item_count(),
            subtotal: summary.priced.subtotal,
            coupon_code: summary.coupon_code.clone(),
            coupon_error: summary.coupon_error.clone(),
            discount: summary.discount(),
            total: summary.total(),
        }
    }
}

/// Add-item request body.
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    #[serde(default = "one")]
    pub quantity: u32,
}

const fn one() -> u32 {
    1
}

/// Set-quantity request body.
#[derive(Debug, Deserialize)]
pub struct QuantityRequest {
    pub quantity: u32,
}

/// Coupon request body.
#[derive(Debug, Deserialize)]
pub struct CouponRequest {
    pub code: String,
}

/// Result of checking a coupon against the cart.
#[derive(Debug, Serialize)]
pub struct CouponPreview {
    pub code: String,
    pub description: String,
    pub discount: Decimal,
    pub total: Decimal,
}

async fn current(state: &AppState, session: &Session) -> Result<Json<CartView>> {
    let summary = load_summary(state, session).await?;
    Ok(Json(CartView::from(&summary)))
}

/// GET /api/cart
///
/// # Errors
///
/// Returns 500/503 if the cart can't be priced.
#[instrument(skip_all)]
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Json<CartView>> {
    current(&state, &session).await
}

/// POST /api/cart/items
///
/// # Errors
///
/// Returns 404 for unknown products and 400 for quantities out of range.
#[instrument(skip(state, session))]
pub async fn add_item(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<CartView>)> {
    add_product(&state, &session, body.product_id, body.quantity).await?;
    Ok((StatusCode::CREATED, current(&state, &session).await?))
}

/// PUT /api/cart/items/{product_id}
///
/// A quantity of zero removes the line.
///
/// # Errors
///
/// Returns 400 if the product isn't in the cart or the quantity is too large.
#[instrument(skip(state, session))]
pub async fn set_quantity(
    State(state): State<AppState>,
    session: Session,
    Path(product_id): Path<ProductId>,
    Json(body): Json<QuantityRequest>,
) -> Result<Json<CartView>> {
    let mut cart = Cart::load(&session).await;
    if body.quantity == 0 {
        cart.remove(product_id);
    } else {
        cart.set_quantity(product_id, body.quantity)?;
    }
    cart.save(&session).await?;
    current(&state, &session).await
}

/// DELETE /api/cart/items/{product_id}
///
/// # Errors
///
/// Returns 500 if the session can't be written.
#[instrument(skip(state, session))]
pub async fn remove_item(
    State(state): State<AppState>,
    session: Session,
    Path(product_id): Path<ProductId>,
) -> Result<Json<CartView>> {
    let mut cart = Cart::load(&session).await;
    if cart.remove(product_id) {
        cart.save(&session).await?;
    }
    current(&state, &session).await
}

/// POST /api/cart/coupon
///
/// # Errors
///
/// Returns 404 for unknown codes and 400 for unusable ones.
#[instrument(skip(state, session))]
pub async fn apply_coupon(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<CouponRequest>,
) -> Result<Json<CartView>> {
    apply_coupon_code(&state, &session, &body.code).await?;
    current(&state, &session).await
}

/// DELETE /api/cart/coupon
///
/// # Errors
///
/// Returns 500 if the session can't be written.
#[instrument(skip_all)]
pub async fn remove_coupon(State(state): State<AppState>, session: Session) -> Result<Json<CartView>> {
    session.remove::<String>(session_keys::CART_COUPON).await?;
    current(&state, &session).await
}

/// POST /api/coupons/validate
///
/// Checks a code against the current cart without applying it.
///
/// # Errors
///
/// Returns 400 for an empty cart or unusable coupon, 404 for unknown codes.
#[instrument(skip(state, session))]
pub async fn validate_coupon(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<CouponRequest>,
) -> Result<Json<CouponPreview>> {
    let summary = load_summary(&state, &session).await?;
    if summary.priced.is_empty() {
        return Err(AppError::BadRequest("Your cart is empty".to_string()));
    }
    let applied = crate::services::checkout::CheckoutService::new(state.pool())
        .preview_coupon(&body.code, summary.priced.subtotal, chrono::Utc::now())
        .await?;

    Ok(Json(CouponPreview {
        description: applied.coupon.value_display(),
        total: (summary.priced.subtotal - applied.discount).max(Decimal::ZERO),
        discount: applied.discount,
        code: applied.coupon.code,
    }))
}
