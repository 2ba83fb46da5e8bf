//! Product repository.

use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use shopfront_core::ProductId;

use super::{RepositoryError, conflict_on_unique, page_offset};
use crate::models::catalog::PRODUCTS_PER_PAGE;
use crate::models::{Product, ProductInput, ProductListing};

const PRODUCT_COLUMNS: &str = "id, slug, name, description, price, compare_at_price, stock, \
                               category, image_url, active, created_at, updated_at";

/// One page of a product listing.
#[derive(Debug, Clone)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub total: i64,
}

/// Repository for catalog products.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Search the catalog.
    ///
    /// With `include_inactive` false only active products are returned, which
    /// is what every storefront listing uses.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn search(
        &self,
        listing: &ProductListing,
        include_inactive: bool,
    ) -> Result<ProductPage, RepositoryError> {
        let mut count_query: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM shopfront.product");
        push_filters(&mut count_query, listing, include_inactive);
        let total: i64 = count_query
            .build_query_scalar::<i64>()
            .fetch_one(self.pool)
            .await?;

        let mut query: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM shopfront.product"));
        push_filters(&mut query, listing, include_inactive);
        query.push(" ORDER BY ");
        query.push(listing.sort_order().order_by());
        query.push(" LIMIT ");
        query.push_bind(i64::from(PRODUCTS_PER_PAGE));
        query.push(" OFFSET ");
        query.push_bind(page_offset(listing.page(), PRODUCTS_PER_PAGE));

        let products = query
            .build_query_as::<Product>()
            .fetch_all(self.pool)
            .await?;

        Ok(ProductPage { products, total })
    }

    /// Newest active products for the home page.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn featured(&self, limit: i64) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS} FROM shopfront.product
            WHERE active AND stock > 0
            ORDER BY created_at DESC, id DESC
            LIMIT $1
            "
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(products)
    }

    /// Get a product by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shopfront.product WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;
        Ok(product)
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shopfront.product WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(product)
    }

    /// Get several products at once (cart rendering). Missing IDs are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shopfront.product WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(self.pool)
        .await?;
        Ok(products)
    }

    /// Distinct categories of active products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn categories(&self) -> Result<Vec<String>, RepositoryError> {
        let categories = sqlx::query_scalar::<_, String>(
            r"
            SELECT DISTINCT category FROM shopfront.product
            WHERE active AND category <> ''
            ORDER BY category
            ",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(categories)
    }

    /// Create a product from a normalized input.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            r"
            INSERT INTO shopfront.product
                (slug, name, description, price, compare_at_price, stock, category, image_url, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(&input.slug)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.compare_at_price)
        .bind(input.stock)
        .bind(&input.category)
        .bind(&input.image_url)
        .bind(input.active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "a product with this slug already exists"))?;
        Ok(product)
    }

    /// Insert or update a product by slug (catalog seeding).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn upsert_by_slug(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            r"
            INSERT INTO shopfront.product
                (slug, name, description, price, compare_at_price, stock, category, image_url, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (slug) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                price = EXCLUDED.price,
                compare_at_price = EXCLUDED.compare_at_price,
                stock = EXCLUDED.stock,
                category = EXCLUDED.category,
                image_url = EXCLUDED.image_url,
                active = EXCLUDED.active,
                updated_at = NOW()
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(&input.slug)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.compare_at_price)
        .bind(input.stock)
        .bind(&input.category)
        .bind(&input.image_url)
        .bind(input.active)
        .fetch_one(self.pool)
        .await?;
        Ok(product)
    }

    /// Update a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    /// Returns `RepositoryError::Conflict` if the new slug is taken.
    pub async fn update(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        sqlx::query_as::<_, Product>(&format!(
            r"
            UPDATE shopfront.product SET
                slug = $2, name = $3, description = $4, price = $5, compare_at_price = $6,
                stock = $7, category = $8, image_url = $9, active = $10, updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&input.slug)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.compare_at_price)
        .bind(input.stock)
        .bind(&input.category)
        .bind(&input.image_url)
        .bind(input.active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "a product with this slug already exists"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a product. Past order lines keep their name and price snapshot.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shopfront.product WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Number of products in the catalog.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shopfront.product")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

/// Load products and lock their rows for the rest of the transaction.
///
/// Rows are locked in ID order so concurrent checkouts cannot deadlock.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_many(
    conn: &mut PgConnection,
    ids: &[ProductId],
) -> Result<Vec<Product>, RepositoryError> {
    let products = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM shopfront.product WHERE id = ANY($1) ORDER BY id FOR UPDATE"
    ))
    .bind(ids)
    .fetch_all(conn)
    .await?;
    Ok(products)
}

/// Adjust stock by `delta` (negative to sell, positive to restock).
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn adjust_stock(
    conn: &mut PgConnection,
    id: ProductId,
    delta: i32,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE shopfront.product SET stock = stock + $2, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .bind(delta)
    .execute(conn)
    .await?;
    Ok(())
}

/// Append the `WHERE` clause for a listing.
fn push_filters<'q>(
    query: &mut QueryBuilder<'q, Postgres>,
    listing: &ProductListing,
    include_inactive: bool,
) {
    query.push(" WHERE TRUE");
    if !include_inactive {
        query.push(" AND active");
    }
    if let Some(q) = listing.search() {
        let pattern = format!("%{}%", escape_like(q));
        query.push(" AND (name ILIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR description ILIKE ");
        query.push_bind(pattern);
        query.push(")");
    }
    if let Some(category) = listing.category_filter() {
        query.push(" AND category = ");
        query.push_bind(category.to_lowercase());
    }
}

/// Escape `LIKE` metacharacters so user input matches literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50% off_now"), "50\\% off\\_now");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_filters_sql() {
        let listing = ProductListing {
            q: Some("mug".to_string()),
            category: Some("Kitchen".to_string()),
            ..Default::default()
        };
        let mut query: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM shopfront.product");
        push_filters(&mut query, &listing, false);
        assert_eq!(
            query.sql(),
            "SELECT COUNT(*) FROM shopfront.product WHERE TRUE AND active \
             AND (name ILIKE $1 OR description ILIKE $2) AND category = $3"
        );
    }
}
