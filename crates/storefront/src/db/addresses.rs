//! Saved address repository.
//!
//! Every query is scoped by `user_id`, so one customer can never read or
//! modify another's addresses. At most one address per user is the default;
//! a partial unique index backs this up.

use sqlx::{PgConnection, PgPool};

use shopfront_core::{AddressId, UserId};

use super::RepositoryError;
use crate::models::{Address, ShippingAddress};

const ADDRESS_COLUMNS: &str = "id, user_id, full_name, line1, line2, city, region, postal_code, \
                               country, is_default, created_at, updated_at";

/// Repository for saved addresses.
pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's addresses, default first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let addresses = sqlx::query_as::<_, Address>(&format!(
            r"
            SELECT {ADDRESS_COLUMNS} FROM shopfront.address
            WHERE user_id = $1
            ORDER BY is_default DESC, created_at DESC, id DESC
            "
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(addresses)
    }

    /// One of the user's addresses.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Option<Address>, RepositoryError> {
        let address = sqlx::query_as::<_, Address>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM shopfront.address WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(address)
    }

    /// The user's default address, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_default(&self, user_id: UserId) -> Result<Option<Address>, RepositoryError> {
        let address = sqlx::query_as::<_, Address>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM shopfront.address WHERE user_id = $1 AND is_default"
        ))
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(address)
    }

    /// Save a new address. The user's first address always becomes the default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        user_id: UserId,
        address: &ShippingAddress,
        make_default: bool,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM shopfront.address WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;
        let make_default = make_default || existing == 0;
        if make_default {
            clear_default(&mut tx, user_id).await?;
        }

        let created = sqlx::query_as::<_, Address>(&format!(
            r"
            INSERT INTO shopfront.address
                (user_id, full_name, line1, line2, city, region, postal_code, country, is_default)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(&address.full_name)
        .bind(&address.line1)
        .bind(&address.line2)
        .bind(&address.city)
        .bind(&address.region)
        .bind(&address.postal_code)
        .bind(&address.country)
        .bind(make_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    /// Update one of the user's addresses.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address doesn't exist or isn't theirs.
    pub async fn update(
        &self,
        user_id: UserId,
        id: AddressId,
        address: &ShippingAddress,
        make_default: bool,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        if make_default {
            clear_default(&mut tx, user_id).await?;
        }

        let updated = sqlx::query_as::<_, Address>(&format!(
            r"
            UPDATE shopfront.address SET
                full_name = $3, line1 = $4, line2 = $5, city = $6, region = $7,
                postal_code = $8, country = $9, is_default = is_default OR $10,
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(id)
        .bind(user_id)
        .bind(&address.full_name)
        .bind(&address.line1)
        .bind(&address.line2)
        .bind(&address.city)
        .bind(&address.region)
        .bind(&address.postal_code)
        .bind(&address.country)
        .bind(make_default)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Make one address the default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address doesn't exist or isn't theirs.
    pub async fn set_default(&self, user_id: UserId, id: AddressId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        clear_default(&mut tx, user_id).await?;
        let result = sqlx::query(
            "UPDATE shopfront.address SET is_default = TRUE WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        tx.commit().await?;
        Ok(())
    }

    /// Delete an address. If it was the default, the newest remaining one takes over.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address doesn't exist or isn't theirs.
    pub async fn delete(&self, user_id: UserId, id: AddressId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let was_default: Option<bool> = sqlx::query_scalar(
            "DELETE FROM shopfront.address WHERE id = $1 AND user_id = $2 RETURNING is_default",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        match was_default {
            None => return Err(RepositoryError::NotFound),
            Some(true) => {
                sqlx::query(
                    r"
                    UPDATE shopfront.address SET is_default = TRUE
                    WHERE id = (
                        SELECT id FROM shopfront.address WHERE user_id = $1
                        ORDER BY created_at DESC, id DESC LIMIT 1
                    )
                    ",
                )
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
            }
            Some(false) => {}
        }

        tx.commit().await?;
        Ok(())
    }
}

async fn clear_default(conn: &mut PgConnection, user_id: UserId) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE shopfront.address SET is_default = FALSE WHERE user_id = $1 AND is_default")
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}
