//! Order and account API for signed-in customers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use tower_sessions::Session;
use tracing::instrument;

use shopfront_core::OrderId;

use crate::db::{AddressRepository, OrderRepository, UserRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireUser;
use crate::models::{Address, Order, OrderItem, OrderSummary, User};
use crate::routes::checkout::{ShippingChoice, place_session_order, resolve_shipping};
use crate::state::AppState;

/// An order with its lines.
#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// The signed-in customer's profile.
#[derive(Debug, Serialize)]
pub struct Account {
    pub user: User,
    pub addresses: Vec<Address>,
}

async fn detail(state: &AppState, order: Order) -> Result<OrderDetail> {
    let items = OrderRepository::new(state.pool()).items(order.id).await?;
    Ok(OrderDetail { order, items })
}

/// GET /api/account
///
/// # Errors
///
/// Returns 404 if the account was deleted after the token was issued.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn account(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Account>> {
    let users = UserRepository::new(state.pool());
    let addresses = AddressRepository::new(state.pool());
    let (profile, addresses) =
        tokio::try_join!(users.get_by_id(user.id), addresses.list(user.id))?;
    let user = profile.ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;
    Ok(Json(Account { user, addresses }))
}

/// GET /api/orders
///
/// # Errors
///
/// Returns 500/503 if orders can't be read.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn list(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<OrderSummary>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(Json(orders))
}

/// POST /api/orders
///
/// Places the session cart as an order. The body is either
/// `{"address_id": 7}` or `{"address": {...}}`.
///
/// # Errors
///
/// Returns 400 for an empty cart, short stock, or an unusable coupon and 404
/// for a saved address that isn't the user's.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn place(
    State(state): State<AppState>,
    session: Session,
    RequireUser(user): RequireUser,
    Json(choice): Json<ShippingChoice>,
) -> Result<(StatusCode, Json<OrderDetail>)> {
    let shipping = resolve_shipping(&state, &user, &choice).await?;
    let order = place_session_order(&state, &session, &user, &shipping).await?;
    tracing::info!(order_id = %order.id, total = %order.total, "Order placed via API");
    Ok((StatusCode::CREATED, Json(detail(&state, order).await?)))
}

/// GET /api/orders/{id}
///
/// # Errors
///
/// Returns 404 unless the order belongs to the caller.
#[instrument(skip(state, user))]
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>> {
    let order = OrderRepository::new(state.pool())
        .get_for_user(user.id, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
    Ok(Json(detail(&state, order).await?))
}
