//! Product review repository.

use sqlx::PgPool;

use shopfront_core::{ProductId, Rating, ReviewId, UserId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::{Review, ReviewSummary};

const REVIEW_SELECT: &str = r"
    SELECT r.id, r.product_id, r.user_id, u.name AS author_name, r.rating, r.comment,
           r.verified_purchase, r.created_at
    FROM shopfront.review r
    JOIN shopfront.user u ON u.id = r.user_id
";

/// Admin moderation row: a review plus the product it belongs to.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReviewWithProduct {
    #[sqlx(flatten)]
    pub review: Review,
    pub product_name: String,
    pub product_slug: String,
}

/// Repository for product reviews.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Reviews for a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn for_product(
        &self,
        product_id: ProductId,
        limit: i64,
    ) -> Result<Vec<Review>, RepositoryError> {
        let reviews = sqlx::query_as::<_, Review>(&format!(
            "{REVIEW_SELECT} WHERE r.product_id = $1 ORDER BY r.created_at DESC, r.id DESC LIMIT $2"
        ))
        .bind(product_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(reviews)
    }

    /// Average rating and count for a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn summary(&self, product_id: ProductId) -> Result<ReviewSummary, RepositoryError> {
        let summary = sqlx::query_as::<_, ReviewSummary>(
            r"
            SELECT COUNT(*) AS count, AVG(rating)::NUMERIC AS average
            FROM shopfront.review
            WHERE product_id = $1
            ",
        )
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;
        Ok(summary)
    }

    /// Whether the user has a paid, shipped, or delivered order containing the product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn has_purchased(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let purchased: bool = sqlx::query_scalar(
            r"
            SELECT EXISTS (
                SELECT 1
                FROM shopfront.order o
                JOIN shopfront.order_item i ON i.order_id = o.id
                WHERE o.user_id = $1
                  AND i.product_id = $2
                  AND o.status IN ('paid', 'shipped', 'delivered')
            )
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;
        Ok(purchased)
    }

    /// Create a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already reviewed this product.
    pub async fn create(
        &self,
        product_id: ProductId,
        user_id: UserId,
        rating: Rating,
        comment: &str,
        verified_purchase: bool,
    ) -> Result<ReviewId, RepositoryError> {
        let id: ReviewId = sqlx::query_scalar(
            r"
            INSERT INTO shopfront.review (product_id, user_id, rating, comment, verified_purchase)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            ",
        )
        .bind(product_id)
        .bind(user_id)
        .bind(rating)
        .bind(comment)
        .bind(verified_purchase)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "you have already reviewed this product"))?;
        Ok(id)
    }

    /// Get one review by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ReviewId) -> Result<Option<Review>, RepositoryError> {
        let review = sqlx::query_as::<_, Review>(&format!("{REVIEW_SELECT} WHERE r.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(review)
    }

    /// Most recent reviews across the catalog (moderation queue).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn recent(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ReviewWithProduct>, RepositoryError> {
        let reviews = sqlx::query_as::<_, ReviewWithProduct>(
            r"
            SELECT r.id, r.product_id, r.user_id, u.name AS author_name, r.rating, r.comment,
                   r.verified_purchase, r.created_at,
                   p.name AS product_name, p.slug AS product_slug
            FROM shopfront.review r
            JOIN shopfront.user u ON u.id = r.user_id
            JOIN shopfront.product p ON p.id = r.product_id
            ORDER BY r.created_at DESC, r.id DESC
            LIMIT $1 OFFSET $2
            ",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;
        Ok(reviews)
    }

    /// Delete a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review doesn't exist.
    pub async fn delete(&self, id: ReviewId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shopfront.review WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
