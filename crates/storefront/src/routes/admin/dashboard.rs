//! Admin dashboard.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tracing::instrument;

use shopfront_core::{Money, Role};

use crate::db::orders::OrderStats;
use crate::db::reviews::ReviewWithProduct;
use crate::db::{OrderRepository, ProductRepository, ReviewRepository, UserRepository};
use crate::error::PageResult;
use crate::middleware::RequireAdmin;
use crate::models::OrderSummary;
use crate::state::AppState;
use crate::views::PageContext;

const RECENT_ORDERS: i64 = 10;
const RECENT_REVIEWS: i64 = 5;

/// Dashboard page template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/dashboard.html")]
pub struct DashboardTemplate {
    pub ctx: PageContext,
    pub stats: OrderStats,
    pub product_count: i64,
    pub customer_count: i64,
    pub admin_count: i64,
    pub recent_orders: Vec<OrderSummary>,
    pub recent_reviews: Vec<ReviewWithProduct>,
}

impl DashboardTemplate {
    #[must_use]
    pub fn revenue_display(&self) -> String {
        Money::new(self.stats.revenue).to_string()
    }
}

/// Store overview: order figures, catalog size, accounts, latest activity.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAdmin(_admin): RequireAdmin,
) -> PageResult<DashboardTemplate> {
    let pool = state.pool();
    let orders = OrderRepository::new(pool);
    let users = UserRepository::new(pool);

    let (stats, recent_orders) = tokio::try_join!(orders.stats(), orders.list(None, RECENT_ORDERS, 0))?;
    let (customer_count, admin_count) =
        tokio::try_join!(users.count_by_role(Role::Customer), users.count_by_role(Role::Admin))?;
    let product_count = ProductRepository::new(pool).count().await?;
    let recent_reviews = ReviewRepository::new(pool).recent(RECENT_REVIEWS, 0).await?;

    Ok(DashboardTemplate {
        ctx,
        stats,
        product_count,
        customer_count,
        admin_count,
        recent_orders,
        recent_reviews,
    })
}
