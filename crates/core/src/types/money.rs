//! Monetary amounts using decimal arithmetic.
//!
//! All prices in Shopfront are a single store currency (USD), stored as
//! `NUMERIC(12, 2)` and handled as [`rust_decimal::Decimal`]. [`Money`] is the
//! display-side wrapper; arithmetic stays on `Decimal`.

use core::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A store-currency amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Zero dollars.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Wrap a decimal amount, rounded to cents (half away from zero).
    #[must_use]
    pub fn new(amount: Decimal) -> Self {
        Self(round_cents(amount))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rounded = round_cents(self.0);
        if rounded.is_sign_negative() && !rounded.is_zero() {
            write!(f, "-${:.2}", rounded.abs())
        } else {
            write!(f, "${:.2}", rounded.abs())
        }
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self::new(amount)
    }
}

/// Round an amount to cents, half away from zero.
#[must_use]
pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_pads_to_cents() {
        assert_eq!(Money::new(Decimal::new(5, 0)).to_string(), "$5.00");
        assert_eq!(Money::new(Decimal::new(1999, 2)).to_string(), "$19.99");
        assert_eq!(Money::new(Decimal::new(-250, 2)).to_string(), "-$2.50");
    }

    #[test]
    fn test_rounding_is_half_away_from_zero() {
        assert_eq!(round_cents(Decimal::new(1005, 3)), Decimal::new(101, 2));
        assert_eq!(round_cents(Decimal::new(-1005, 3)), Decimal::new(-101, 2));
        assert_eq!(round_cents(Decimal::new(1004, 3)), Decimal::new(100, 2));
    }
}
