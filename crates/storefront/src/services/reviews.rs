//! Product reviews.

use sqlx::PgPool;
use thiserror::Error;

use shopfront_core::{ProductId, Rating, ReviewId, UserId};

use crate::db::{RepositoryError, ReviewRepository};

/// Longest accepted review comment, in characters.
pub const MAX_COMMENT_CHARS: usize = 2000;

/// Why a review was refused.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("rating must be between 1 and 5")]
    InvalidRating,
    #[error("comment must be at most {MAX_COMMENT_CHARS} characters")]
    CommentTooLong,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Trim and bound a review comment.
///
/// # Errors
///
/// Returns `ReviewError::CommentTooLong` past [`MAX_COMMENT_CHARS`].
pub fn clean_comment(comment: &str) -> Result<&str, ReviewError> {
    let comment = comment.trim();
    if comment.chars().count() > MAX_COMMENT_CHARS {
        return Err(ReviewError::CommentTooLong);
    }
    Ok(comment)
}

/// Record a review, marking it verified when the user bought the product.
///
/// # Errors
///
/// Returns `ReviewError::InvalidRating` or `CommentTooLong` for bad input,
/// and `ReviewError::Repository` with `Conflict` if the user already
/// reviewed this product.
pub async fn submit(
    pool: &PgPool,
    product_id: ProductId,
    user_id: UserId,
    rating: i64,
    comment: &str,
) -> Result<ReviewId, ReviewError> {
    let rating = Rating::new(rating).map_err(|_| ReviewError::InvalidRating)?;
    let comment = clean_comment(comment)?;

    let reviews = ReviewRepository::new(pool);
    let verified = reviews.has_purchased(user_id, product_id).await?;
    let id = reviews
        .create(product_id, user_id, rating, comment, verified)
        .await?;

    tracing::info!(review_id = %id, product_id = %product_id, user_id = %user_id, verified, "Review submitted");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_is_trimmed() {
        assert!(matches!(clean_comment("  lovely mug \n"), Ok("lovely mug")));
    }

    #[test]
    fn test_comment_length_counts_characters() {
        let at_limit = "é".repeat(MAX_COMMENT_CHARS);
        assert!(clean_comment(&at_limit).is_ok());
        let over = "a".repeat(MAX_COMMENT_CHARS + 1);
        assert!(matches!(clean_comment(&over), Err(ReviewError::CommentTooLong)));
    }
}
