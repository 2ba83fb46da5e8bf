//! Order management route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::Redirect,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use shopfront_core::{OrderId, OrderStatus};

use super::ADMIN_PAGE_SIZE;
use crate::db::orders::StatusChange;
use crate::db::{OrderRepository, UserRepository, page_offset};
use crate::error::{AppError, PageResult};
use crate::middleware::RequireAdmin;
use crate::models::{Order, OrderItem, OrderSummary, User};
use crate::state::AppState;
use crate::views::{FlashKind, PageContext, set_flash};

/// Order list filters.
#[derive(Debug, Default, Deserialize)]
pub struct OrdersQuery {
    /// Status to filter by; blank or unknown shows every order.
    pub status: Option<String>,
    pub page: Option<u32>,
}

impl OrdersQuery {
    #[must_use]
    pub fn status_filter(&self) -> Option<OrderStatus> {
        self.status.as_deref().and_then(|s| s.parse().ok())
    }

    #[must_use]
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }
}

/// Status change form data.
#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: String,
}

/// Order list template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/orders/index.html")]
pub struct OrdersIndexTemplate {
    pub ctx: PageContext,
    pub orders: Vec<OrderSummary>,
    pub status: Option<OrderStatus>,
    pub statuses: [OrderStatus; 5],
    pub current_page: u32,
    /// Whether a full page was returned, so another may follow.
    pub has_next: bool,
}

impl OrdersIndexTemplate {
    #[must_use]
    pub fn is_filter(&self, status: &OrderStatus) -> bool {
        self.status == Some(*status)
    }

    #[must_use]
    pub fn status_param(&self) -> &'static str {
        self.status.map_or("", OrderStatus::as_str)
    }
}

/// Order detail template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/orders/show.html")]
pub struct OrderShowTemplate {
    pub ctx: PageContext,
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub customer: Option<User>,
    pub next_statuses: Vec<OrderStatus>,
}

/// Order list, newest first.
#[instrument(skip(state, ctx, _admin))]
pub async fn index(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<OrdersQuery>,
) -> PageResult<OrdersIndexTemplate> {
    let status = query.status_filter();
    let page = query.page();
    let orders = OrderRepository::new(state.pool())
        .list(status, i64::from(ADMIN_PAGE_SIZE), page_offset(page, ADMIN_PAGE_SIZE))
        .await?;

    Ok(OrdersIndexTemplate {
        ctx,
        has_next: orders.len() == ADMIN_PAGE_SIZE as usize,
        orders,
        status,
        statuses: OrderStatus::ALL,
        current_page: page,
    })
}

/// Order detail with the statuses it can move to.
#[instrument(skip(state, ctx, _admin))]
pub async fn show(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<OrderId>,
) -> PageResult<OrderShowTemplate> {
    let orders = OrderRepository::new(state.pool());
    let order = orders
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
    let items = orders.items(order.id).await?;
    let customer = UserRepository::new(state.pool())
        .get_by_id(order.user_id)
        .await?;

    Ok(OrderShowTemplate {
        ctx,
        next_statuses: order.status.next_statuses(),
        order,
        items,
        customer,
    })
}

/// Move an order to another status. Cancelling puts the stock back.
#[instrument(skip(state, session, admin))]
pub async fn update_status(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Form(form): Form<StatusForm>,
) -> PageResult<Redirect> {
    let back = format!("/admin/orders/{id}");
    let Ok(to) = form.status.parse::<OrderStatus>() else {
        set_flash(&session, FlashKind::Error, "Unknown order status").await;
        return Ok(Redirect::to(&back));
    };

    match OrderRepository::new(state.pool()).change_status(id, to).await? {
        StatusChange::Updated(order) => {
            tracing::info!(order_id = %order.id, status = %order.status, admin_id = %admin.id, "Order status changed");
            set_flash(&session, FlashKind::Success, format!("Order marked {}", order.status)).await;
        }
        StatusChange::NotAllowed { from, to } => {
            set_flash(
                &session,
                FlashKind::Error,
                format!("A {from} order cannot be marked {to}"),
            )
            .await;
        }
    }
    Ok(Redirect::to(&back))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_status_filter_shows_all() {
        let query = OrdersQuery {
            status: Some("lost".to_string()),
            page: None,
        };
        assert_eq!(query.status_filter(), None);
        assert_eq!(query.page(), 1);
    }

    #[test]
    fn test_status_filter_parses() {
        let query = OrdersQuery {
            status: Some("shipped".to_string()),
            page: Some(2),
        };
        assert_eq!(query.status_filter(), Some(OrderStatus::Shipped));
        assert_eq!(query.page(), 2);
    }
}
