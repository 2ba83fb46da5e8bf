//! Orders and their line items.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopfront_core::{Money, OrderId, OrderItemId, OrderStatus, ProductId, UserId};

/// Shipping address as snapshotted onto an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub full_name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
}

impl ShippingAddress {
    #[must_use]
    pub fn one_line(&self) -> String {
        let mut parts = vec![self.full_name.as_str(), self.line1.as_str()];
        if let Some(line2) = &self.line2 {
            parts.push(line2);
        }
        parts.push(&self.city);
        if !self.region.is_empty() {
            parts.push(&self.region);
        }
        parts.push(&self.postal_code);
        parts.push(&self.country);
        parts.join(", ")
    }
}

/// A placed order.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub coupon_code: Option<String>,
    pub ship_name: String,
    pub ship_line1: String,
    pub ship_line2: Option<String>,
    pub ship_city: String,
    pub ship_region: String,
    pub ship_postal_code: String,
    pub ship_country: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[must_use]
    pub fn shipping(&self) -> ShippingAddress {
        ShippingAddress {
            full_name: self.ship_name.clone(),
            line1: self.ship_line1.clone(),
            line2: self.ship_line2.clone(),
            city: self.ship_city.clone(),
            region: self.ship_region.clone(),
            postal_code: self.ship_postal_code.clone(),
            country: self.ship_country.clone(),
        }
    }

    #[must_use]
    pub fn subtotal_display(&self) -> String {
        Money::new(self.subtotal).to_string()
    }

    #[must_use]
    pub fn discount_display(&self) -> String {
        Money::new(self.discount).to_string()
    }

    #[must_use]
    pub fn total_display(&self) -> String {
        Money::new(self.total).to_string()
    }

    #[must_use]
    pub fn has_discount(&self) -> bool {
        !self.discount.is_zero()
    }

    #[must_use]
    pub fn date_display(&self) -> String {
        self.created_at.format("%b %-d, %Y").to_string()
    }
}

/// A line on an order, with the name and price at the time of purchase.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

impl OrderItem {
    #[must_use]
    pub fn unit_price_display(&self) -> String {
        Money::new(self.unit_price).to_string()
    }

    #[must_use]
    pub fn line_total_display(&self) -> String {
        Money::new(self.line_total).to_string()
    }
}

/// Order row for lists, joined with the customer's email.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderSummary {
    pub id: OrderId,
    pub user_id: UserId,
    pub customer_email: String,
    pub status: OrderStatus,
    pub total: Decimal,
    pub item_count: i64,
    pub created_at: DateTime<Utc>,
}

impl OrderSummary {
    #[must_use]
    pub fn total_display(&self) -> String {
        Money::new(self.total).to_string()
    }

    #[must_use]
    pub fn date_display(&self) -> String {
        self.created_at.format("%b %-d, %Y").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_line_skips_empty_parts() {
        let address = ShippingAddress {
            full_name: "Grace Hopper".to_string(),
            line1: "1 Navy Way".to_string(),
            line2: None,
            city: "Arlington".to_string(),
            region: String::new(),
            postal_code: "22201".to_string(),
            country: "US".to_string(),
        };
        assert_eq!(address.one_line(), "Grace Hopper, 1 Navy Way, Arlington, 22201, US");
    }
}
