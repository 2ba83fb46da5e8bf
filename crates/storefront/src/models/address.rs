//! Saved shipping addresses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopfront_core::{AddressId, UserId};

use super::order::ShippingAddress;

/// A user's saved shipping address.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub full_name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Address {
    /// Snapshot this address for an order.
    #[must_use]
    pub fn to_shipping(&self) -> ShippingAddress {
        ShippingAddress {
            full_name: self.full_name.clone(),
            line1: self.line1.clone(),
            line2: self.line2.clone(),
            city: self.city.clone(),
            region: self.region.clone(),
            postal_code: self.postal_code.clone(),
            country: self.country.clone(),
        }
    }

    /// Single-line rendering for lists.
    #[must_use]
    pub fn one_line(&self) -> String {
        self.to_shipping().one_line()
    }
}

/// Create/update payload for an address.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressInput {
    pub full_name: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub region: String,
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub is_default: Option<String>,
}

impl AddressInput {
    /// HTML checkboxes submit `on`; JSON clients may send `true`.
    #[must_use]
    pub fn wants_default(&self) -> bool {
        matches!(self.is_default.as_deref(), Some("on" | "true" | "1"))
    }

    /// Trim fields and reject missing required ones.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first empty required field.
    pub fn validate(&self) -> Result<ShippingAddress, String> {
        let required = [
            ("full name", &self.full_name),
            ("address line 1", &self.line1),
            ("city", &self.city),
            ("postal code", &self.postal_code),
            ("country", &self.country),
        ];
        for (label, value) in required {
            if value.trim().is_empty() {
                return Err(format!("{label} is required"));
            }
            if value.len() > 200 {
                return Err(format!("{label} is too long"));
            }
        }

        Ok(ShippingAddress {
            full_name: self.full_name.trim().to_string(),
            line1: self.line1.trim().to_string(),
            line2: self
                .line2
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
            city: self.city.trim().to_string(),
            region: self.region.trim().to_string(),
            postal_code: self.postal_code.trim().to_string(),
            country: self.country.trim().to_string(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input() -> AddressInput {
        AddressInput {
            full_name: " Ada Lovelace ".to_string(),
            line1: "12 St James's Square".to_string(),
            line2: Some("  ".to_string()),
            city: "London".to_string(),
            region: String::new(),
            postal_code: "SW1Y 4JH".to_string(),
            country: "GB".to_string(),
            is_default: Some("on".to_string()),
        }
    }

    #[test]
    fn test_validate_trims_and_drops_blank_line2() {
        let shipping = input().validate().unwrap();
        assert_eq!(shipping.full_name, "Ada Lovelace");
        assert!(shipping.line2.is_none());
        assert!(input().wants_default());
    }

    #[test]
    fn test_validate_requires_city() {
        let mut bad = input();
        bad.city = " ".to_string();
        assert_eq!(bad.validate().unwrap_err(), "city is required");
    }
}
