//! Cart route handlers.
//!
//! The cart lives in the server-side session; every render re-prices it
//! against the catalog and re-validates any applied coupon.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::Redirect,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use shopfront_core::{Money, ProductId};

use crate::db::ProductRepository;
use crate::error::{AppError, PageResult};
use crate::models::session_keys;
use crate::services::cart::{Cart, PricedCart};
use crate::services::checkout::{AppliedCoupon, CheckoutError, CheckoutService};
use crate::state::AppState;
use crate::views::{FlashKind, PageContext, set_flash};

// =============================================================================
// Cart Summary
// =============================================================================

/// A priced cart with its coupon applied.
#[derive(Debug, Clone)]
pub struct CartSummary {
    pub cart: Cart,
    pub priced: PricedCart,
    pub coupon_code: Option<String>,
    pub coupon: Option<AppliedCoupon>,
    /// Why the stored coupon no longer applies.
    pub coupon_error: Option<String>,
}

impl CartSummary {
    #[must_use]
    pub fn discount(&self) -> Decimal {
        self.coupon.as_ref().map_or(Decimal::ZERO, |c| c.discount)
    }

    #[must_use]
    pub fn total(&self) -> Decimal {
        (self.priced.subtotal - self.discount()).max(Decimal::ZERO)
    }

    #[must_use]
    pub fn discount_display(&self) -> String {
        Money::new(self.discount()).to_string()
    }

    #[must_use]
    pub fn total_display(&self) -> String {
        Money::new(self.total()).to_string()
    }

    /// Whether every line can be fulfilled from current stock.
    #[must_use]
    pub fn all_in_stock(&self) -> bool {
        self.priced.lines.iter().all(|line| line.in_stock())
    }
}

async fn stored_coupon(session: &Session) -> Option<String> {
    session
        .get::<String>(session_keys::CART_COUPON)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to read cart coupon from session");
            None
        })
}

/// Load, clean, and price the session cart.
///
/// Lines for products that were deleted or deactivated are dropped from the
/// stored cart.
///
/// # Errors
///
/// Returns `AppError` if the catalog or coupon lookup fails, or the session
/// cannot be written.
pub async fn load_summary(state: &AppState, session: &Session) -> Result<CartSummary, AppError> {
    let mut cart = Cart::load(session).await;
    let products = if cart.is_empty() {
        Vec::new()
    } else {
        ProductRepository::new(state.pool())
            .get_many(&cart.product_ids())
            .await?
    };

    let dropped = cart.retain_available(&products);
    if dropped > 0 {
        tracing::info!(dropped, "Removed unavailable products from cart");
        cart.save(session).await?;
    }
    let priced = cart.price(&products);

    let coupon_code = stored_coupon(session).await;
    let (coupon, coupon_error) = match &coupon_code {
        Some(code) if !priced.is_empty() => {
            match CheckoutService::new(state.pool())
                .preview_coupon(code, priced.subtotal, Utc::now())
                .await
            {
                Ok(applied) => (Some(applied), None),
                Err(CheckoutError::Coupon(err)) => (None, Some(err.to_string())),
                Err(err) => return Err(err.into()),
            }
        }
        _ => (None, None),
    };

    Ok(CartSummary {
        cart,
        priced,
        coupon_code,
        coupon,
        coupon_error,
    })
}

/// Remember a coupon code for this cart after checking it applies.
///
/// # Errors
///
/// Returns `AppError::Checkout` if the coupon is unknown or unusable.
pub async fn apply_coupon_code(
    state: &AppState,
    session: &Session,
    code: &str,
) -> Result<AppliedCoupon, AppError> {
    let summary = load_summary(state, session).await?;
    if summary.priced.is_empty() {
        return Err(CheckoutError::EmptyCart.into());
    }
    let applied = CheckoutService::new(state.pool())
        .preview_coupon(code, summary.priced.subtotal, Utc::now())
        .await?;
    session
        .insert(session_keys::CART_COUPON, &applied.coupon.code)
        .await?;
    Ok(applied)
}

/// Add a product to the cart after checking it can be bought.
///
/// # Errors
///
/// Returns `AppError::NotFound` for unknown or inactive products and
/// `AppError::Cart` if the quantity is out of range.
pub async fn add_product(
    state: &AppState,
    session: &Session,
    product_id: ProductId,
    quantity: u32,
) -> Result<Cart, AppError> {
    let product = ProductRepository::new(state.pool())
        .get_by_id(product_id)
        .await?
        .filter(|p| p.active)
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    let mut cart = Cart::load(session).await;
    cart.add(product.id, quantity)?;
    cart.save(session).await?;
    tracing::debug!(product_id = %product.id, quantity, "Added to cart");
    Ok(cart)
}

// =============================================================================
// Forms
// =============================================================================

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: ProductId,
    pub quantity: Option<u32>,
    /// Where to go afterwards (defaults to the cart).
    pub back: Option<String>,
}

/// Update quantity form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Remove line form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: ProductId,
}

/// Coupon form data.
#[derive(Debug, Deserialize, Serialize)]
pub struct CouponForm {
    pub code: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub ctx: PageContext,
    pub summary: CartSummary,
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the cart page.
#[instrument(skip(state, session, ctx))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    mut ctx: PageContext,
) -> PageResult<CartShowTemplate> {
    let summary = load_summary(&state, &session).await?;
    ctx.cart_count = summary.cart.item_count();
    Ok(CartShowTemplate { ctx, summary })
}

/// Add an item to the cart.
#[instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<AddToCartForm>,
) -> PageResult<Redirect> {
    let back = crate::middleware::access::safe_next(form.back.as_deref().or(Some("/cart")));
    match add_product(&state, &session, form.product_id, form.quantity.unwrap_or(1)).await {
        Ok(_) => set_flash(&session, FlashKind::Success, "Added to your cart").await,
        Err(err @ (AppError::Cart(_) | AppError::NotFound(_))) => {
            set_flash(&session, FlashKind::Error, err.public_message()).await;
        }
        Err(err) => return Err(err.into()),
    }
    Ok(Redirect::to(&back))
}

/// Change a line's quantity. Zero removes the line.
#[instrument(skip(session))]
pub async fn update(session: Session, Form(form): Form<UpdateCartForm>) -> PageResult<Redirect> {
    let mut cart = Cart::load(&session).await;
    let result = if form.quantity == 0 {
        cart.remove(form.product_id);
        Ok(())
    } else {
        cart.set_quantity(form.product_id, form.quantity)
    };
    match result {
        Ok(()) => cart.save(&session).await?,
        Err(err) => set_flash(&session, FlashKind::Error, AppError::from(err).public_message()).await,
    }
    Ok(Redirect::to("/cart"))
}

/// Remove a line from the cart.
#[instrument(skip(session))]
pub async fn remove(session: Session, Form(form): Form<RemoveFromCartForm>) -> PageResult<Redirect> {
    let mut cart = Cart::load(&session).await;
    if cart.remove(form.product_id) {
        cart.save(&session).await?;
    }
    Ok(Redirect::to("/cart"))
}

/// Apply a coupon code to the cart.
#[instrument(skip(state, session))]
pub async fn apply_coupon(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CouponForm>,
) -> PageResult<Redirect> {
    match apply_coupon_code(&state, &session, &form.code).await {
        Ok(applied) => {
            let message = format!(
                "Coupon {} applied: {} off",
                applied.coupon.code,
                applied.discount_display()
            );
            set_flash(&session, FlashKind::Success, message).await;
        }
        Err(err) if !err.status().is_server_error() => {
            set_flash(&session, FlashKind::Error, err.public_message()).await;
        }
        Err(err) => return Err(err.into()),
    }
    Ok(Redirect::to("/cart"))
}

/// Remove the applied coupon.
#[instrument(skip(session))]
pub async fn remove_coupon(session: Session) -> PageResult<Redirect> {
    session.remove::<String>(session_keys::CART_COUPON).await?;
    Ok(Redirect::to("/cart"))
}
