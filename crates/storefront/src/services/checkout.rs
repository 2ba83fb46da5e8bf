//! Coupon arithmetic and order placement.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;

use shopfront_core::{DiscountKind, Money, UserId, round_cents};

use crate::db::orders::{self, NewOrder, NewOrderItem};
use crate::db::{CouponRepository, RepositoryError, coupons, products};
use crate::models::{Coupon, Order, ShippingAddress, coupon::normalize_code};
use crate::services::cart::Cart;

/// Why a coupon cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponError {
    #[error("coupon code not found")]
    NotFound,
    #[error("this coupon is no longer active")]
    Inactive,
    #[error("this coupon has expired")]
    Expired,
    #[error("this coupon has reached its usage limit")]
    UsageLimitReached,
    #[error("this coupon requires a subtotal of at least {}", money(.0))]
    MinimumNotMet(Decimal),
}

fn money(amount: &Decimal) -> Money {
    Money::new(*amount)
}

/// Why an order could not be placed.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("your cart is empty")]
    EmptyCart,
    #[error("{0} is no longer available")]
    ProductUnavailable(String),
    #[error("only {available} of {product} left in stock")]
    InsufficientStock { product: String, available: i32 },
    #[error(transparent)]
    Coupon(#[from] CouponError),
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CheckoutError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// Check that a coupon can be used on a cart with this subtotal.
///
/// # Errors
///
/// Returns the first `CouponError` that applies.
pub fn validate_coupon(
    coupon: &Coupon,
    subtotal: Decimal,
    now: DateTime<Utc>,
) -> Result<(), CouponError> {
    if !coupon.active {
        return Err(CouponError::Inactive);
    }
    if coupon.expires_at.is_some_and(|at| at <= now) {
        return Err(CouponError::Expired);
    }
    if coupon.max_uses.is_some_and(|max| coupon.used_count >= max) {
        return Err(CouponError::UsageLimitReached);
    }
    if subtotal < coupon.min_subtotal {
        return Err(CouponError::MinimumNotMet(coupon.min_subtotal));
    }
    Ok(())
}

/// Discount for a subtotal.
///
/// Percentages round half away from zero to the cent. Neither kind ever
/// discounts more than the subtotal.
#[must_use]
pub fn compute_discount(kind: DiscountKind, value: Decimal, subtotal: Decimal) -> Decimal {
    if subtotal <= Decimal::ZERO || value <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let raw = match kind {
        DiscountKind::Percentage => round_cents(subtotal * value / Decimal::ONE_HUNDRED),
        DiscountKind::Fixed => round_cents(value),
    };
    raw.min(subtotal)
}

/// A coupon applied to a subtotal.
#[derive(Debug, Clone)]
pub struct AppliedCoupon {
    pub coupon: Coupon,
    pub discount: Decimal,
}

impl AppliedCoupon {
    #[must_use]
    pub fn discount_display(&self) -> String {
        Money::new(self.discount).to_string()
    }
}

/// Checkout operations.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Look up and validate a coupon for a cart preview. Nothing is reserved.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Coupon` if the code is unknown or unusable.
    pub async fn preview_coupon(
        &self,
        code: &str,
        subtotal: Decimal,
        now: DateTime<Utc>,
    ) -> Result<AppliedCoupon, CheckoutError> {
        let coupon = CouponRepository::new(self.pool)
            .get_by_code(&normalize_code(code))
            .await?
            .ok_or(CouponError::NotFound)?;
        validate_coupon(&coupon, subtotal, now)?;
        let discount = compute_discount(coupon.kind, coupon.value, subtotal);
        Ok(AppliedCoupon { coupon, discount })
    }

    /// Turn a cart into a pending order.
    ///
    /// Products and the coupon are locked for the duration of the
    /// transaction, so stock and coupon usage can't be oversold by concurrent
    /// checkouts. Names and prices are copied onto the order lines.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart`, `ProductUnavailable`,
    /// `InsufficientStock`, or `Coupon` for business rule failures.
    pub async fn place_order(
        &self,
        user_id: UserId,
        cart: &Cart,
        coupon_code: Option<&str>,
        shipping: &ShippingAddress,
        now: DateTime<Utc>,
    ) -> Result<Order, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let mut tx = self.pool.begin().await?;
        let locked = products::lock_many(&mut tx, &cart.product_ids()).await?;

        let mut lines = Vec::with_capacity(cart.lines().len());
        for line in cart.lines() {
            let Some(product) = locked.iter().find(|p| p.id == line.product_id) else {
                return Err(CheckoutError::ProductUnavailable(format!(
                    "Product #{}",
                    line.product_id
                )));
            };
            if !product.active {
                return Err(CheckoutError::ProductUnavailable(product.name.clone()));
            }
            let quantity = i32::try_from(line.quantity).unwrap_or(i32::MAX);
            if product.stock < quantity {
                return Err(CheckoutError::InsufficientStock {
                    product: product.name.clone(),
                    available: product.stock.max(0),
                });
            }
            lines.push((product, quantity));
        }

        let subtotal: Decimal = lines
            .iter()
            .map(|(p, qty)| p.price * Decimal::from(*qty))
            .sum();

        let coupon = match coupon_code.map(normalize_code).filter(|c| !c.is_empty()) {
            Some(code) => {
                let coupon = coupons::lock_by_code(&mut tx, &code)
                    .await?
                    .ok_or(CouponError::NotFound)?;
                validate_coupon(&coupon, subtotal, now)?;
                Some(coupon)
            }
            None => None,
        };
        let discount = coupon
            .as_ref()
            .map_or(Decimal::ZERO, |c| compute_discount(c.kind, c.value, subtotal));

        let order = orders::insert(
            &mut tx,
            &NewOrder {
                user_id,
                subtotal,
                discount,
                total: subtotal - discount,
                coupon_code: coupon.as_ref().map(|c| c.code.as_str()),
                shipping,
            },
        )
        .await?;

        for (product, quantity) in &lines {
            orders::insert_item(
                &mut tx,
                order.id,
                &NewOrderItem {
                    product_id: product.id,
                    product_name: &product.name,
                    unit_price: product.price,
                    quantity: *quantity,
                    line_total: product.price * Decimal::from(*quantity),
                },
            )
            .await?;
            products::adjust_stock(&mut tx, product.id, -quantity).await?;
        }

        if let Some(coupon) = &coupon {
            coupons::increment_usage(&mut tx, coupon.id).await?;
        }

        tx.commit().await?;
        tracing::info!(
            order_id = %order.id,
            user_id = %user_id,
            total = %order.total,
            coupon = ?order.coupon_code,
            "Order placed"
        );
        Ok(order)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeDelta;
    use shopfront_core::CouponId;

    use super::*;

    fn coupon(kind: DiscountKind, value: Decimal) -> Coupon {
        Coupon {
            id: CouponId::new(1),
            code: "SAVE".to_string(),
            kind,
            value,
            min_subtotal: Decimal::ZERO,
            max_uses: None,
            used_count: 0,
            expires_at: None,
            active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_percentage_rounds_half_away_from_zero() {
        // 15% of 10.10 = 1.515
        assert_eq!(
            compute_discount(DiscountKind::Percentage, Decimal::new(15, 0), Decimal::new(1010, 2)),
            Decimal::new(152, 2)
        );
        // 10% of 0.05 = 0.005
        assert_eq!(
            compute_discount(DiscountKind::Percentage, Decimal::new(10, 0), Decimal::new(5, 2)),
            Decimal::new(1, 2)
        );
    }

    #[test]
    fn test_discount_never_exceeds_subtotal() {
        assert_eq!(
            compute_discount(DiscountKind::Fixed, Decimal::new(50, 0), Decimal::new(1999, 2)),
            Decimal::new(1999, 2)
        );
        assert_eq!(
            compute_discount(DiscountKind::Percentage, Decimal::new(100, 0), Decimal::new(1999, 2)),
            Decimal::new(1999, 2)
        );
        assert_eq!(
            compute_discount(DiscountKind::Fixed, Decimal::new(5, 0), Decimal::ZERO),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_fixed_discount_applies_in_full() {
        assert_eq!(
            compute_discount(DiscountKind::Fixed, Decimal::new(5, 0), Decimal::new(2000, 2)),
            Decimal::new(500, 2)
        );
    }

    #[test]
    fn test_coupon_validation_rules() {
        let now = Utc::now();
        let subtotal = Decimal::new(50, 0);

        let ok = coupon(DiscountKind::Fixed, Decimal::new(5, 0));
        assert!(validate_coupon(&ok, subtotal, now).is_ok());

        let mut inactive = ok.clone();
        inactive.active = false;
        assert_eq!(validate_coupon(&inactive, subtotal, now), Err(CouponError::Inactive));

        let mut expired = ok.clone();
        expired.expires_at = Some(now - TimeDelta::minutes(1));
        assert_eq!(validate_coupon(&expired, subtotal, now), Err(CouponError::Expired));

        let mut used_up = ok.clone();
        used_up.max_uses = Some(3);
        used_up.used_count = 3;
        assert_eq!(
            validate_coupon(&used_up, subtotal, now),
            Err(CouponError::UsageLimitReached)
        );

        let mut minimum = ok;
        minimum.min_subtotal = Decimal::new(75, 0);
        assert_eq!(
            validate_coupon(&minimum, subtotal, now),
            Err(CouponError::MinimumNotMet(Decimal::new(75, 0)))
        );
    }

    #[test]
    fn test_minimum_message_shows_money() {
        let err = CouponError::MinimumNotMet(Decimal::new(75, 0));
        assert_eq!(err.to_string(), "this coupon requires a subtotal of at least $75.00");
    }
}
