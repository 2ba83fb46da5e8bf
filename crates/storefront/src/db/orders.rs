//! Order repository.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use shopfront_core::{OrderId, OrderStatus, ProductId, UserId};

use super::{RepositoryError, products};
use crate::models::{Order, OrderItem, OrderSummary, ShippingAddress};

const ORDER_COLUMNS: &str = "id, user_id, status, subtotal, discount, total, coupon_code, \
                             ship_name, ship_line1, ship_line2, ship_city, ship_region, \
                             ship_postal_code, ship_country, created_at, updated_at";

const SUMMARY_SELECT: &str = r"
    SELECT o.id, o.user_id, u.email AS customer_email, o.status, o.total,
           COALESCE((SELECT SUM(i.quantity) FROM shopfront.order_item i WHERE i.order_id = o.id), 0)::BIGINT
               AS item_count,
           o.created_at
    FROM shopfront.order o
    JOIN shopfront.user u ON u.id = o.user_id
";

/// Totals written onto a new order.
#[derive(Debug, Clone)]
pub struct NewOrder<'a> {
    pub user_id: UserId,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub coupon_code: Option<&'a str>,
    pub shipping: &'a ShippingAddress,
}

/// A line written onto a new order.
#[derive(Debug, Clone)]
pub struct NewOrderItem<'a> {
    pub product_id: ProductId,
    pub product_name: &'a str,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// Store-wide figures for the admin dashboard.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, sqlx::FromRow)]
pub struct OrderStats {
    pub order_count: i64,
    pub pending_count: i64,
    pub revenue: Decimal,
}

/// Outcome of an administrative status change.
#[derive(Debug, Clone)]
pub enum StatusChange {
    Updated(Order),
    /// The current status does not allow moving to the requested one.
    NotAllowed { from: OrderStatus, to: OrderStatus },
}

/// Repository for orders.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<OrderSummary>, RepositoryError> {
        let orders = sqlx::query_as::<_, OrderSummary>(&format!(
            "{SUMMARY_SELECT} WHERE o.user_id = $1 ORDER BY o.created_at DESC, o.id DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(orders)
    }

    /// All orders, optionally filtered by status, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<OrderSummary>, RepositoryError> {
        let orders = sqlx::query_as::<_, OrderSummary>(&format!(
            r"
            {SUMMARY_SELECT}
            WHERE ($1::shopfront.order_status IS NULL OR o.status = $1)
            ORDER BY o.created_at DESC, o.id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;
        Ok(orders)
    }

    /// An order by ID, regardless of owner (admin).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            r"SELECT {ORDER_COLUMNS} FROM shopfront.order WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(order)
    }

    /// An order by ID, only if it belongs to `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_user(
        &self,
        user_id: UserId,
        id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            r"SELECT {ORDER_COLUMNS} FROM shopfront.order WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(order)
    }

    /// Line items of an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let items = sqlx::query_as::<_, OrderItem>(
            r"
            SELECT id, order_id, product_id, product_name, unit_price, quantity, line_total
            FROM shopfront.order_item
            WHERE order_id = $1
            ORDER BY id
            ",
        )
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;
        Ok(items)
    }

    /// Counts and revenue. Revenue covers paid, shipped, and delivered orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn stats(&self) -> Result<OrderStats, RepositoryError> {
        let stats = sqlx::query_as::<_, OrderStats>(
            r"
            SELECT COUNT(*) AS order_count,
                   COUNT(*) FILTER (WHERE status = 'pending') AS pending_count,
                   COALESCE(SUM(total) FILTER (WHERE status IN ('paid', 'shipped', 'delivered')), 0)
                       AS revenue
            FROM shopfront.order
            ",
        )
        .fetch_one(self.pool)
        .await?;
        Ok(stats)
    }

    /// Move an order to a new status.
    ///
    /// The transition is checked against the current status under a row lock.
    /// Cancelling returns every line's quantity to stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn change_status(
        &self,
        id: OrderId,
        to: OrderStatus,
    ) -> Result<StatusChange, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let from: OrderStatus =
            sqlx::query_scalar(r"SELECT status FROM shopfront.order WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(RepositoryError::NotFound)?;

        if !from.can_transition_to(to) {
            return Ok(StatusChange::NotAllowed { from, to });
        }

        if to == OrderStatus::Cancelled {
            restock(&mut tx, id).await?;
        }

        let order = sqlx::query_as::<_, Order>(&format!(
            r"
            UPDATE shopfront.order SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(to)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(order_id = %id, from = %from, to = %to, "Order status changed");
        Ok(StatusChange::Updated(order))
    }
}

/// Insert an order header.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert(conn: &mut PgConnection, order: &NewOrder<'_>) -> Result<Order, RepositoryError> {
    let created = sqlx::query_as::<_, Order>(&format!(
        r"
        INSERT INTO shopfront.order
            (user_id, status, subtotal, discount, total, coupon_code,
             ship_name, ship_line1, ship_line2, ship_city, ship_region, ship_postal_code, ship_country)
        VALUES ($1, 'pending', $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(order.user_id)
    .bind(order.subtotal)
    .bind(order.discount)
    .bind(order.total)
    .bind(order.coupon_code)
    .bind(&order.shipping.full_name)
    .bind(&order.shipping.line1)
    .bind(&order.shipping.line2)
    .bind(&order.shipping.city)
    .bind(&order.shipping.region)
    .bind(&order.shipping.postal_code)
    .bind(&order.shipping.country)
    .fetch_one(conn)
    .await?;
    Ok(created)
}

/// Insert an order line.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert_item(
    conn: &mut PgConnection,
    order_id: OrderId,
    item: &NewOrderItem<'_>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO shopfront.order_item
            (order_id, product_id, product_name, unit_price, quantity, line_total)
        VALUES ($1, $2, $3, $4, $5, $6)
        ",
    )
    .bind(order_id)
    .bind(item.product_id)
    .bind(item.product_name)
    .bind(item.unit_price)
    .bind(item.quantity)
    .bind(item.line_total)
    .execute(conn)
    .await?;
    Ok(())
}

/// Return an order's quantities to stock. Lines whose product was deleted are skipped.
///
/// Products are locked in id order first, the same order checkout takes them in.
async fn restock(conn: &mut PgConnection, order_id: OrderId) -> Result<(), RepositoryError> {
    let lines: Vec<(ProductId, i32)> = sqlx::query_as(
        r"
        SELECT product_id, quantity FROM shopfront.order_item
        WHERE order_id = $1 AND product_id IS NOT NULL
        ",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    let returns = restock_quantities(lines);
    let ids: Vec<ProductId> = returns.keys().copied().collect();
    products::lock_many(&mut *conn, &ids).await?;
    for (id, quantity) in returns {
        products::adjust_stock(&mut *conn, id, quantity).await?;
    }
    Ok(())
}

/// Total quantity per product, keyed in lock order.
fn restock_quantities(lines: Vec<(ProductId, i32)>) -> BTreeMap<ProductId, i32> {
    let mut totals = BTreeMap::new();
    for (id, quantity) in lines {
        *totals.entry(id).or_insert(0) += quantity;
    }
    totals
}
