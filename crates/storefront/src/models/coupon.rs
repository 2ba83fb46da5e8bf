//! Discount coupons.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopfront_core::{CouponId, DiscountKind, Money};

/// A discount code.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Coupon {
    pub id: CouponId,
    /// Uppercase code as typed by shoppers.
    pub code: String,
    pub kind: DiscountKind,
    /// Percentage (0-100) or fixed amount, depending on `kind`.
    pub value: Decimal,
    pub min_subtotal: Decimal,
    pub max_uses: Option<i32>,
    pub used_count: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Coupon {
    /// Human-readable value, e.g. `15% off` or `$10.00 off`.
    #[must_use]
    pub fn value_display(&self) -> String {
        match self.kind {
            DiscountKind::Percentage => format!("{}% off", self.value.normalize()),
            DiscountKind::Fixed => format!("{} off", Money::new(self.value)),
        }
    }

    #[must_use]
    pub fn usage_display(&self) -> String {
        self.max_uses.map_or_else(
            || format!("{} / unlimited", self.used_count),
            |max| format!("{} / {max}", self.used_count),
        )
    }

    #[must_use]
    pub fn expires_display(&self) -> String {
        self.expires_at
            .map_or_else(|| "never".to_string(), |at| at.format("%Y-%m-%d %H:%M UTC").to_string())
    }
}

/// Create/update payload for a coupon.
#[derive(Debug, Clone, Deserialize)]
pub struct CouponInput {
    pub code: String,
    pub kind: DiscountKind,
    pub value: Decimal,
    #[serde(default)]
    pub min_subtotal: Option<Decimal>,
    #[serde(default)]
    pub max_uses: Option<i32>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

impl CouponInput {
    /// Normalize the payload: uppercase code, bounded values.
    ///
    /// # Errors
    ///
    /// Returns a user-facing message for the first invalid field.
    pub fn normalized(mut self) -> Result<Self, String> {
        self.code = normalize_code(&self.code);
        if self.code.is_empty() || self.code.len() > 40 {
            return Err("code must be 1-40 characters".to_string());
        }
        if !self
            .code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err("code may only contain letters, digits, - and _".to_string());
        }
        if self.value <= Decimal::ZERO {
            return Err("value must be positive".to_string());
        }
        if self.kind == DiscountKind::Percentage && self.value > Decimal::ONE_HUNDRED {
            return Err("percentage cannot exceed 100".to_string());
        }
        if self.min_subtotal.is_some_and(|m| m.is_sign_negative()) {
            return Err("minimum subtotal cannot be negative".to_string());
        }
        if self.max_uses.is_some_and(|m| m <= 0) {
            return Err("usage limit must be positive".to_string());
        }
        Ok(self)
    }
}

/// Canonical form of a code typed by a shopper.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input(kind: DiscountKind, value: Decimal) -> CouponInput {
        CouponInput {
            code: " spring-10 ".to_string(),
            kind,
            value,
            min_subtotal: None,
            max_uses: None,
            expires_at: None,
            active: true,
        }
    }

    #[test]
    fn test_code_uppercased() {
        let coupon = input(DiscountKind::Fixed, Decimal::TEN).normalized().unwrap();
        assert_eq!(coupon.code, "SPRING-10");
    }

    #[test]
    fn test_percentage_bounds() {
        assert!(
            input(DiscountKind::Percentage, Decimal::new(101, 0))
                .normalized()
                .is_err()
        );
        assert!(
            input(DiscountKind::Percentage, Decimal::ONE_HUNDRED)
                .normalized()
                .is_ok()
        );
        assert!(input(DiscountKind::Fixed, Decimal::ZERO).normalized().is_err());
    }

    #[test]
    fn test_code_charset() {
        let mut bad = input(DiscountKind::Fixed, Decimal::TEN);
        bad.code = "NO SPACES".to_string();
        assert!(bad.normalized().is_err());
    }
}
