//! Admin API.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use shopfront_core::{OrderId, OrderStatus};

use crate::db::orders::{OrderStats, StatusChange};
use crate::db::{OrderRepository, page_offset};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{Order, OrderSummary};
use crate::routes::admin::{ADMIN_PAGE_SIZE, orders::OrdersQuery};
use crate::state::AppState;

/// Status change request body.
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

/// One page of orders.
#[derive(Debug, Serialize)]
pub struct OrderPage {
    pub orders: Vec<OrderSummary>,
    pub page: u32,
    pub has_next: bool,
}

/// GET /api/admin/stats
///
/// # Errors
///
/// Returns 500/503 if the totals can't be read.
#[instrument(skip_all)]
pub async fn stats(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<OrderStats>> {
    Ok(Json(OrderRepository::new(state.pool()).stats().await?))
}

/// GET /api/admin/orders
///
/// # Errors
///
/// Returns 500/503 if orders can't be read.
#[instrument(skip(state, _admin))]
pub async fn orders(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<OrdersQuery>,
) -> Result<Json<OrderPage>> {
    let page = query.page();
    let orders = OrderRepository::new(state.pool())
        .list(
            query.status_filter(),
            i64::from(ADMIN_PAGE_SIZE),
            page_offset(page, ADMIN_PAGE_SIZE),
        )
        .await?;
    Ok(Json(OrderPage {
        has_next: orders.len() == ADMIN_PAGE_SIZE as usize,
        orders,
        page,
    }))
}

/// PATCH /api/admin/orders/{id}/status
///
/// # Errors
///
/// Returns 404 for unknown orders and 409 when the order can't move to the
/// requested status.
#[instrument(skip(state, admin))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<Order>> {
    match OrderRepository::new(state.pool())
        .change_status(id, body.status)
        .await?
    {
        StatusChange::Updated(order) => {
            tracing::info!(order_id = %order.id, status = %order.status, admin_id = %admin.id, "Order status changed via API");
            Ok(Json(order))
        }
        StatusChange::NotAllowed { from, to } => Err(AppError::Conflict(format!(
            "A {from} order cannot be marked {to}"
        ))),
    }
}
