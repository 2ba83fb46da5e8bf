//! Checkout route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use shopfront_core::AddressId;

use crate::db::AddressRepository;
use crate::error::{AppError, PageResult, add_breadcrumb, sentence};
use crate::middleware::RequireUser;
use crate::models::{Address, AddressInput, CurrentUser, Order, ShippingAddress, session_keys};
use crate::routes::cart::{CartSummary, load_summary};
use crate::services::cart::Cart;
use crate::services::checkout::CheckoutService;
use crate::state::AppState;
use crate::views::{FlashKind, PageContext, set_flash};

/// Where an order ships to.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ShippingChoice {
    Saved { address_id: AddressId },
    New { address: AddressInput },
}

/// Turn a shipping choice into the address snapshot stored on the order.
///
/// A new address is saved to the account when it asks to be the default.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for an incomplete address and
/// `AppError::NotFound` for a saved address that isn't the user's.
pub async fn resolve_shipping(
    state: &AppState,
    user: &CurrentUser,
    choice: &ShippingChoice,
) -> Result<ShippingAddress, AppError> {
    let addresses = AddressRepository::new(state.pool());
    match choice {
        ShippingChoice::Saved { address_id } => addresses
            .get(user.id, *address_id)
            .await?
            .map(|a| a.to_shipping())
            .ok_or_else(|| AppError::NotFound("Address not found".to_string())),
        ShippingChoice::New { address } => {
            let shipping = address.validate().map_err(|msg| AppError::BadRequest(sentence(&msg)))?;
            if address.wants_default() {
                addresses.create(user.id, &shipping, true).await?;
            }
            Ok(shipping)
        }
    }
}

/// Place an order for the session cart and empty it.
///
/// # Errors
///
/// Returns `AppError::Checkout` when the cart, stock, or coupon rules fail.
pub async fn place_session_order(
    state: &AppState,
    session: &Session,
    user: &CurrentUser,
    shipping: &ShippingAddress,
) -> Result<Order, AppError> {
    let cart = Cart::load(session).await;
    let coupon = session.get::<String>(session_keys::CART_COUPON).await?;

    let order = CheckoutService::new(state.pool())
        .place_order(user.id, &cart, coupon.as_deref(), shipping, Utc::now())
        .await?;

    Cart::clear(session).await?;
    session.remove::<String>(session_keys::CART_COUPON).await?;
    let order_id = order.id.to_string();
    add_breadcrumb("checkout", "Order placed", Some(&[("order_id", order_id.as_str())]));
    Ok(order)
}


/// Checkout form data: either a saved address id or a new address.
#[derive(Debug, Deserialize)]
pub struct CheckoutForm {
    /// A saved address id, or `new` (or blank) to use the fields below.
    #[serde(default)]
    pub address_id: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: String,
    /// Save the new address as the account default.
    #[serde(default)]
    pub save_address: Option<String>,
}

impl CheckoutForm {
    #[must_use]
    pub fn choice(self) -> ShippingChoice {
        if let Ok(address_id) = self.address_id.trim().parse::<AddressId>() {
            return ShippingChoice::Saved { address_id };
        }
        ShippingChoice::New {
            address: AddressInput {
                full_name: self.full_name,
                line1: self.line1,
                line2: self.line2,
                city: self.city,
                region: self.region,
                postal_code: self.postal_code,
                country: self.country,
                is_default: self.save_address,
            },
        }
    }
}

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout.html")]
pub struct CheckoutTemplate {
    pub ctx: PageContext,
    pub summary: CartSummary,
    pub addresses: Vec<Address>,
}

/// Display the checkout page, or send an empty cart back to the cart page.
#[instrument(skip(state, session, ctx, user))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    mut ctx: PageContext,
    RequireUser(user): RequireUser,
) -> PageResult<Response> {
    let summary = load_summary(&state, &session).await?;
    if summary.priced.is_empty() {
        set_flash(&session, FlashKind::Error, "Your cart is empty").await;
        return Ok(Redirect::to("/cart").into_response());
    }
    let addresses = AddressRepository::new(state.pool()).list(user.id).await?;
    ctx.cart_count = summary.cart.item_count();

    Ok(CheckoutTemplate {
        ctx,
        summary,
        addresses,
    }
    .into_response())
}

/// Place the order.
#[instrument(skip(state, session, user, form))]
pub async fn place(
    State(state): State<AppState>,
    session: Session,
    RequireUser(user): RequireUser,
    Form(form): Form<CheckoutForm>,
) -> PageResult<Redirect> {
    let result = async {
        let shipping = resolve_shipping(&state, &user, &form.choice()).await?;
        place_session_order(&state, &session, &user, &shipping).await
    }
    .await;

    match result {
        Ok(order) => {
            set_flash(&session, FlashKind::Success, format!("Order #{} placed", order.id)).await;
            Ok(Redirect::to(&format!("/orders/{}", order.id)))
        }
        Err(err) if !err.status().is_server_error() => {
            set_flash(&session, FlashKind::Error, err.public_message()).await;
            Ok(Redirect::to("/checkout"))
        }
        Err(err) => Err(err.into()),
    }
}
