//! Refresh token persistence.
//!
//! Every issued refresh token has a row keyed by its `jti`. Rotation revokes
//! the presented row and records its replacement; all rows descending from
//! one login share a `family_id`, so a replayed token can take the whole
//! family down.
//!
//! The row-locking operations take a `PgConnection` so the auth service can
//! run them inside a single transaction.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use shopfront_core::UserId;

use super::RepositoryError;

/// A stored refresh token.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredRefreshToken {
    pub jti: Uuid,
    pub family_id: Uuid,
    pub user_id: UserId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub replaced_by: Option<Uuid>,
}

/// A refresh token about to be stored.
#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub jti: Uuid,
    pub family_id: Uuid,
    pub user_id: UserId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Repository for refresh token rows.
pub struct RefreshTokenRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> RefreshTokenRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a newly issued token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert(&self, token: &NewRefreshToken) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        insert(&mut conn, token).await
    }

    /// Revoke every live token in a family.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn revoke_family(
        &self,
        family_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        revoke_family(&mut conn, family_id, now).await
    }

    /// Delete rows that expired before `now`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM shopfront.refresh_token WHERE expires_at < $1")
            .bind(now)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Load a token row and lock it for the rest of the transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock(
    conn: &mut PgConnection,
    jti: Uuid,
) -> Result<Option<StoredRefreshToken>, RepositoryError> {
    let row = sqlx::query_as::<_, StoredRefreshToken>(
        r"
        SELECT jti, family_id, user_id, issued_at, expires_at, revoked_at, replaced_by
        FROM shopfront.refresh_token
        WHERE jti = $1
        FOR UPDATE
        ",
    )
    .bind(jti)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

/// Insert a token row.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert(
    conn: &mut PgConnection,
    token: &NewRefreshToken,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO shopfront.refresh_token (jti, family_id, user_id, issued_at, expires_at)
        VALUES ($1, $2, $3, $4, $5)
        ",
    )
    .bind(token.jti)
    .bind(token.family_id)
    .bind(token.user_id)
    .bind(token.issued_at)
    .bind(token.expires_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Mark a token as rotated into `replacement`.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn mark_replaced(
    conn: &mut PgConnection,
    jti: Uuid,
    replacement: Uuid,
    now: DateTime<Utc>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE shopfront.refresh_token
        SET revoked_at = $2, replaced_by = $3
        WHERE jti = $1
        ",
    )
    .bind(jti)
    .bind(now)
    .bind(replacement)
    .execute(conn)
    .await?;
    Ok(())
}

/// Revoke every not-yet-revoked token in a family.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn revoke_family(
    conn: &mut PgConnection,
    family_id: Uuid,
    now: DateTime<Utc>,
) -> Result<u64, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE shopfront.refresh_token
        SET revoked_at = $2
        WHERE family_id = $1 AND revoked_at IS NULL
        ",
    )
    .bind(family_id)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
