//! Session-backed shopping cart.
//!
//! The cart is a list of (product, quantity) lines kept in the visitor's
//! server-side session, so it survives login and works for guests. Prices
//! are never stored: they are read from the catalog each time the cart is
//! priced.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_sessions::Session;

use shopfront_core::{Money, ProductId};

use crate::models::{Product, session_keys};

/// Largest quantity of one product per line.
pub const MAX_QUANTITY: u32 = 99;

/// Largest number of distinct products in a cart.
pub const MAX_LINES: usize = 50;

/// Invalid cart edits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("quantity must be between 1 and {MAX_QUANTITY}")]
    InvalidQuantity,
    #[error("a cart can hold at most {MAX_LINES} different products")]
    TooManyLines,
    #[error("that product is not in your cart")]
    NotInCart,
}

/// One cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// The cart as stored in the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Load the cart from the session. A missing or unreadable cart is empty.
    pub async fn load(session: &Session) -> Self {
        match session.get::<Self>(session_keys::CART).await {
            Ok(cart) => cart.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read cart from session");
                Self::default()
            }
        }
    }

    /// Store the cart in the session.
    ///
    /// # Errors
    ///
    /// Returns the session error if the store rejects the write.
    pub async fn save(&self, session: &Session) -> Result<(), tower_sessions::session::Error> {
        session.insert(session_keys::CART, self).await
    }

    /// Remove the cart (and any applied coupon) from the session.
    ///
    /// # Errors
    ///
    /// Returns the session error if the store rejects the write.
    pub async fn clear(session: &Session) -> Result<(), tower_sessions::session::Error> {
        session.remove::<Self>(session_keys::CART).await?;
        session.remove::<String>(session_keys::CART_COUPON).await?;
        Ok(())
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    #[must_use]
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.lines.iter().map(|l| l.product_id).collect()
    }

    #[must_use]
    pub fn quantity_of(&self, product_id: ProductId) -> u32 {
        self.lines
            .iter()
            .find(|l| l.product_id == product_id)
            .map_or(0, |l| l.quantity)
    }

    /// Add units of a product. Adding to an existing line saturates at
    /// [`MAX_QUANTITY`].
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for zero or over-limit quantities,
    /// or `CartError::TooManyLines` if a new line would exceed [`MAX_LINES`].
    pub fn add(&mut self, product_id: ProductId, quantity: u32) -> Result<(), CartError> {
        if !(1..=MAX_QUANTITY).contains(&quantity) {
            return Err(CartError::InvalidQuantity);
        }
        if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == product_id) {
            line.quantity = line.quantity.saturating_add(quantity).min(MAX_QUANTITY);
            return Ok(());
        }
        if self.lines.len() >= MAX_LINES {
            return Err(CartError::TooManyLines);
        }
        self.lines.push(CartLine {
            product_id,
            quantity,
        });
        Ok(())
    }

    /// Set a line's quantity. Zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotInCart` if the product has no line, or
    /// `CartError::InvalidQuantity` above [`MAX_QUANTITY`].
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: u32) -> Result<(), CartError> {
        if quantity > MAX_QUANTITY {
            return Err(CartError::InvalidQuantity);
        }
        let index = self
            .lines
            .iter()
            .position(|l| l.product_id == product_id)
            .ok_or(CartError::NotInCart)?;
        if quantity == 0 {
            self.lines.remove(index);
        } else if let Some(line) = self.lines.get_mut(index) {
            line.quantity = quantity;
        }
        Ok(())
    }

    /// Remove a line. Returns whether it was present.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        self.lines.len() != before
    }

    /// Drop lines whose product no longer exists or is inactive.
    /// Returns how many lines were dropped.
    pub fn retain_available(&mut self, products: &[Product]) -> usize {
        let before = self.lines.len();
        self.lines.retain(|line| {
            products
                .iter()
                .any(|p| p.id == line.product_id && p.active)
        });
        before - self.lines.len()
    }

    /// Price the cart against current catalog rows.
    ///
    /// Lines whose product is missing or inactive are skipped.
    #[must_use]
    pub fn price(&self, products: &[Product]) -> PricedCart {
        let lines: Vec<PricedLine> = self
            .lines
            .iter()
            .filter_map(|line| {
                let product = products
                    .iter()
                    .find(|p| p.id == line.product_id && p.active)?;
                let line_total = product.price * Decimal::from(line.quantity);
                Some(PricedLine {
                    product: product.clone(),
                    quantity: line.quantity,
                    line_total,
                })
            })
            .collect();
        let subtotal = lines.iter().map(|l| l.line_total).sum();
        PricedCart { lines, subtotal }
    }
}

/// A cart line with its current product and price.
#[derive(Debug, Clone)]
pub struct PricedLine {
    pub product: Product,
    pub quantity: u32,
    pub line_total: Decimal,
}

impl PricedLine {
    #[must_use]
    pub fn line_total_display(&self) -> String {
        Money::new(self.line_total).to_string()
    }

    /// Whether there is enough stock for this line right now.
    #[must_use]
    pub fn in_stock(&self) -> bool {
        i64::from(self.product.stock) >= i64::from(self.quantity)
    }
}

/// A priced cart.
#[derive(Debug, Clone, Default)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    pub subtotal: Decimal,
}

impl PricedCart {
    #[must_use]
    pub fn subtotal_display(&self) -> String {
        Money::new(self.subtotal).to_string()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use chrono::Utc;
    use super::*;

    pub(crate) fn product(id: i32, price: Decimal, stock: i32) -> Product {
        Product {
            id: ProductId::new(id),
            slug: format!("product-{id}"),
            name: format!("Product {id}"),
            description: String::new(),
            price,
            compare_at_price: None,
            stock,
            category: "general".to_string(),
            image_url: None,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_add_merges_lines_and_caps_quantity() {
        let mut cart = Cart::default();
        cart.add(ProductId::new(1), 2).unwrap();
        cart.add(ProductId::new(1), 3).unwrap();
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.quantity_of(ProductId::new(1)), 5);

        cart.add(ProductId::new(1), 99).unwrap();
        assert_eq!(cart.quantity_of(ProductId::new(1)), MAX_QUANTITY);
    }

    #[test]
    fn test_add_rejects_bad_quantities() {
        let mut cart = Cart::default();
        assert_eq!(cart.add(ProductId::new(1), 0), Err(CartError::InvalidQuantity));
        assert_eq!(cart.add(ProductId::new(1), 100), Err(CartError::InvalidQuantity));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_line_limit() {
        let mut cart = Cart::default();
        for id in 0..50 {
            cart.add(ProductId::new(id), 1).unwrap();
        }
        assert_eq!(cart.add(ProductId::new(99), 1), Err(CartError::TooManyLines));
        // Existing lines can still grow.
        cart.add(ProductId::new(0), 1).unwrap();
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let mut cart = Cart::default();
        cart.add(ProductId::new(1), 2).unwrap();
        cart.set_quantity(ProductId::new(1), 7).unwrap();
        assert_eq!(cart.quantity_of(ProductId::new(1)), 7);
        cart.set_quantity(ProductId::new(1), 0).unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.set_quantity(ProductId::new(1), 1), Err(CartError::NotInCart));
    }

    #[test]
    fn test_price_skips_inactive_and_missing() {
        let mut cart = Cart::default();
        cart.add(ProductId::new(1), 2).unwrap();
        cart.add(ProductId::new(2), 1).unwrap();
        cart.add(ProductId::new(3), 1).unwrap();

        let mut inactive = product(2, Decimal::new(500, 2), 10);
        inactive.active = false;
        let products = vec![product(1, Decimal::new(1250, 2), 10), inactive];

        let priced = cart.price(&products);
        assert_eq!(priced.lines.len(), 1);
        assert_eq!(priced.subtotal, Decimal::new(2500, 2));
        assert_eq!(priced.subtotal_display(), "$25.00");

        assert_eq!(cart.retain_available(&products), 2);
        assert_eq!(cart.product_ids(), vec![ProductId::new(1)]);
    }

    #[test]
    fn test_stock_flag() {
        let mut cart = Cart::default();
        cart.add(ProductId::new(1), 3).unwrap();
        let priced = cart.price(&[product(1, Decimal::new(100, 2), 2)]);
        assert!(!priced.lines.first().unwrap().in_stock());
    }
}
