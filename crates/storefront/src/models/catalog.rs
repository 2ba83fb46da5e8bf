//! Catalog types: products and reviews.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopfront_core::{Money, ProductId, Rating, ReviewId, UserId, slugify};

/// Products shown per listing page.
pub const PRODUCTS_PER_PAGE: u32 = 12;

/// A catalog product.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub stock: i32,
    pub category: String,
    pub image_url: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[must_use]
    pub fn price_display(&self) -> String {
        Money::new(self.price).to_string()
    }

    /// The struck-through original price, only when it exceeds the current price.
    #[must_use]
    pub fn compare_at_display(&self) -> Option<String> {
        self.compare_at_price
            .filter(|p| *p > self.price)
            .map(|p| Money::new(p).to_string())
    }

    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }

    /// Whether a shopper can buy it right now.
    #[must_use]
    pub const fn purchasable(&self) -> bool {
        self.active && self.in_stock()
    }
}

/// Create/update payload for a product (admin form and CLI seed).
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub compare_at_price: Option<Decimal>,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

impl ProductInput {
    /// Normalize the payload; a blank slug is derived from the name.
    ///
    /// # Errors
    ///
    /// Returns a user-facing message for the first invalid field.
    pub fn normalized(mut self) -> Result<Self, String> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err("name is required".to_string());
        }
        if self.name.len() > 200 {
            return Err("name must be at most 200 characters".to_string());
        }

        self.slug = if self.slug.trim().is_empty() {
            slugify(&self.name)
        } else {
            slugify(&self.slug)
        };
        if self.slug.is_empty() {
            return Err("slug must contain letters or digits".to_string());
        }

        if self.price.is_sign_negative() {
            return Err("price cannot be negative".to_string());
        }
        if self.compare_at_price.is_some_and(|p| p.is_sign_negative()) {
            return Err("compare-at price cannot be negative".to_string());
        }
        if self.stock < 0 {
            return Err("stock cannot be negative".to_string());
        }

        self.category = self.category.trim().to_lowercase();
        self.image_url = self
            .image_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        if let Some(url) = &self.image_url
            && !(url.starts_with("https://") || url.starts_with('/'))
        {
            return Err("image URL must be https or a local path".to_string());
        }

        Ok(self)
    }
}

/// Listing sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
}

impl ProductSort {
    pub const ALL: [Self; 3] = [Self::Newest, Self::PriceAsc, Self::PriceDesc];

    /// Label for the sort picker.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Newest => "Newest",
            Self::PriceAsc => "Price: low to high",
            Self::PriceDesc => "Price: high to low",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
        }
    }

    /// SQL `ORDER BY` clause for this sort.
    #[must_use]
    pub const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "created_at DESC, id DESC",
            Self::PriceAsc => "price ASC, id ASC",
            Self::PriceDesc => "price DESC, id DESC",
        }
    }
}

/// Listing query parameters (`/products?q=&category=&sort=&page=`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductListing {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub sort: Option<ProductSort>,
    #[serde(default)]
    pub page: Option<u32>,
}

impl ProductListing {
    /// Trimmed search text, if any.
    #[must_use]
    pub fn search(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }

    #[must_use]
    pub fn category_filter(&self) -> Option<&str> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    #[must_use]
    pub fn sort_order(&self) -> ProductSort {
        self.sort.unwrap_or_default()
    }

    #[must_use]
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }
}

/// A product review with the author's display name.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub author_name: String,
    pub rating: Rating,
    pub comment: String,
    pub verified_purchase: bool,
    pub created_at: DateTime<Utc>,
}

impl Review {
    #[must_use]
    pub fn stars(&self) -> String {
        self.rating.stars()
    }

    #[must_use]
    pub fn date_display(&self) -> String {
        self.created_at.format("%b %-d, %Y").to_string()
    }
}

/// Average rating and count for a product.
#[derive(Debug, Clone, Copy, Default, Serialize, sqlx::FromRow)]
pub struct ReviewSummary {
    pub count: i64,
    pub average: Option<Decimal>,
}

impl ReviewSummary {
    /// Average to one decimal, e.g. `4.3`.
    #[must_use]
    pub fn average_display(&self) -> String {
        self.average
            .map_or_else(|| "-".to_string(), |avg| format!("{:.1}", avg.round_dp(1)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input(name: &str) -> ProductInput {
        ProductInput {
            name: name.to_string(),
            slug: String::new(),
            description: String::new(),
            price: Decimal::new(1999, 2),
            compare_at_price: None,
            stock: 3,
            category: " Apparel ".to_string(),
            image_url: Some(" ".to_string()),
            active: true,
        }
    }

    #[test]
    fn test_blank_slug_derived_from_name() {
        let product = input("Linen Shirt").normalized().unwrap();
        assert_eq!(product.slug, "linen-shirt");
        assert_eq!(product.category, "apparel");
        assert!(product.image_url.is_none());
    }

    #[test]
    fn test_explicit_slug_is_normalized() {
        let mut p = input("Linen Shirt");
        p.slug = "Summer Linen!".to_string();
        assert_eq!(p.normalized().unwrap().slug, "summer-linen");
    }

    #[test]
    fn test_rejects_negative_stock_and_price() {
        let mut p = input("Mug");
        p.stock = -1;
        assert!(p.normalized().is_err());

        let mut p = input("Mug");
        p.price = Decimal::new(-1, 0);
        assert!(p.normalized().is_err());
    }

    #[test]
    fn test_rejects_insecure_image_url() {
        let mut p = input("Mug");
        p.image_url = Some("http://cdn.test/mug.png".to_string());
        assert!(p.normalized().is_err());
    }

    #[test]
    fn test_listing_defaults() {
        let listing = ProductListing {
            q: Some("  ".to_string()),
            page: Some(0),
            ..Default::default()
        };
        assert!(listing.search().is_none());
        assert_eq!(listing.page(), 1);
        assert_eq!(listing.sort_order(), ProductSort::Newest);
    }

    #[test]
    fn test_review_summary_display() {
        let summary = ReviewSummary {
            count: 3,
            average: Some(Decimal::new(43333, 4)),
        };
        assert_eq!(summary.average_display(), "4.3");
        assert_eq!(ReviewSummary::default().average_display(), "-");
    }
}
