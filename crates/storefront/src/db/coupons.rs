//! Coupon repository.

use sqlx::{PgConnection, PgPool};

use shopfront_core::CouponId;

use super::{RepositoryError, conflict_on_unique};
use crate::models::{Coupon, CouponInput};

const COUPON_COLUMNS: &str =
    "id, code, kind, value, min_subtotal, max_uses, used_count, expires_at, active, created_at";

/// Repository for discount coupons.
pub struct CouponRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CouponRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Look up a coupon by its (already normalized) code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        let coupon = sqlx::query_as::<_, Coupon>(&format!(
            "SELECT {COUPON_COLUMNS} FROM shopfront.coupon WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(self.pool)
        .await?;
        Ok(coupon)
    }

    /// Get a coupon by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CouponId) -> Result<Option<Coupon>, RepositoryError> {
        let coupon = sqlx::query_as::<_, Coupon>(&format!(
            "SELECT {COUPON_COLUMNS} FROM shopfront.coupon WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(coupon)
    }

    /// All coupons, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Coupon>, RepositoryError> {
        let coupons = sqlx::query_as::<_, Coupon>(&format!(
            "SELECT {COUPON_COLUMNS} FROM shopfront.coupon ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(coupons)
    }

    /// Create a coupon from a normalized input.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code is taken.
    pub async fn create(&self, input: &CouponInput) -> Result<Coupon, RepositoryError> {
        let coupon = sqlx::query_as::<_, Coupon>(&format!(
            r"
            INSERT INTO shopfront.coupon (code, kind, value, min_subtotal, max_uses, expires_at, active)
            VALUES ($1, $2, $3, COALESCE($4, 0), $5, $6, $7)
            RETURNING {COUPON_COLUMNS}
            "
        ))
        .bind(&input.code)
        .bind(input.kind)
        .bind(input.value)
        .bind(input.min_subtotal)
        .bind(input.max_uses)
        .bind(input.expires_at)
        .bind(input.active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "a coupon with this code already exists"))?;
        Ok(coupon)
    }

    /// Update a coupon. The usage counter is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon doesn't exist.
    pub async fn update(&self, id: CouponId, input: &CouponInput) -> Result<Coupon, RepositoryError> {
        sqlx::query_as::<_, Coupon>(&format!(
            r"
            UPDATE shopfront.coupon SET
                code = $2, kind = $3, value = $4, min_subtotal = COALESCE($5, 0),
                max_uses = $6, expires_at = $7, active = $8
            WHERE id = $1
            RETURNING {COUPON_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&input.code)
        .bind(input.kind)
        .bind(input.value)
        .bind(input.min_subtotal)
        .bind(input.max_uses)
        .bind(input.expires_at)
        .bind(input.active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "a coupon with this code already exists"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a coupon. Orders keep the code as text.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon doesn't exist.
    pub async fn delete(&self, id: CouponId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shopfront.coupon WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

/// Load a coupon by code and lock it for the rest of the transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_by_code(
    conn: &mut PgConnection,
    code: &str,
) -> Result<Option<Coupon>, RepositoryError> {
    let coupon = sqlx::query_as::<_, Coupon>(&format!(
        "SELECT {COUPON_COLUMNS} FROM shopfront.coupon WHERE code = $1 FOR UPDATE"
    ))
    .bind(code)
    .fetch_optional(conn)
    .await?;
    Ok(coupon)
}

/// Count one redemption.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn increment_usage(conn: &mut PgConnection, id: CouponId) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE shopfront.coupon SET used_count = used_count + 1 WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}
