//! Authentication service.
//!
//! Password registration and login, plus refresh-token rotation. Every login
//! starts a token *family*; each refresh revokes the presented token and
//! issues its successor in the same family. Presenting a token that was
//! already rotated (outside a short grace window for concurrent tabs) is
//! treated as theft and revokes the whole family.

mod error;
pub mod tokens;

pub use error::AuthError;
pub use tokens::{TokenIssuer, TokenPair, TokenStatus};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, TimeDelta, Utc};
use sqlx::PgPool;

use shopfront_core::{Email, Role, UserId};

use crate::db::RepositoryError;
use crate::db::refresh_tokens::{self, NewRefreshToken, RefreshTokenRepository, StoredRefreshToken};
use crate::db::users::UserRepository;
use crate::models::User;
use tokens::RefreshClaims;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length (argon2 input is hashed, but keep requests bounded).
const MAX_PASSWORD_LENGTH: usize = 256;

/// Maximum display name length.
const MAX_NAME_LENGTH: usize = 100;

/// How long after a rotation the old refresh token is answered with
/// `StaleRefresh` instead of being treated as reuse.
const REUSE_GRACE: TimeDelta = TimeDelta::seconds(30);

/// Authentication service.
pub struct AuthService<'a> {
    pool: &'a PgPool,
    users: UserRepository<'a>,
    tokens: &'a TokenIssuer,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, tokens: &'a TokenIssuer) -> Self {
        Self {
            pool,
            users: UserRepository::new(pool),
            tokens,
        }
    }

    /// Register a new customer account.
    ///
    /// Email screening (disposable domains, signup rate) is the caller's job;
    /// see [`crate::services::protection::Shield::protect_signup`].
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        let name = validate_name(name)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let user = self
            .users
            .create(&email, name, &password_hash, Role::Customer)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Verify credentials and start a new session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<(User, TokenPair), AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        let pair = self.tokens.issue_pair(&user, now).map_err(AuthError::Token)?;
        RefreshTokenRepository::new(self.pool)
            .insert(&new_row(&user, &pair))
            .await?;

        tracing::info!(user_id = %user.id, family_id = %pair.family_id, "User logged in");
        Ok((user, pair))
    }

    /// Rotate a refresh token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the token cannot be used (the
    /// caller should clear cookies), `AuthError::StaleRefresh` if a concurrent
    /// request just rotated it (the caller should keep cookies), or
    /// `AuthError::Repository` on database failure.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        now: DateTime<Utc>,
    ) -> Result<(User, TokenPair), AuthError> {
        let claims = self
            .tokens
            .decode_refresh(refresh_token, now)
            .map_err(|err| {
                tracing::debug!(error = %err, "Refresh token rejected");
                AuthError::InvalidToken
            })?;
        let user_id = claims.user_id().map_err(|_| AuthError::InvalidToken)?;

        let mut tx = self.pool.begin().await?;
        let stored = refresh_tokens::lock(&mut tx, claims.jti)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        match check_rotation(&stored, &claims, user_id, now) {
            Rotation::Allowed => {}
            Rotation::Stale => {
                tx.rollback().await?;
                return Err(AuthError::StaleRefresh);
            }
            Rotation::Reused => {
                let revoked = refresh_tokens::revoke_family(&mut tx, stored.family_id, now).await?;
                tx.commit().await?;
                tracing::warn!(
                    user_id = %user_id,
                    family_id = %stored.family_id,
                    revoked,
                    "Refresh token reuse detected, family revoked"
                );
                return Err(AuthError::InvalidToken);
            }
            Rotation::Rejected => {
                tx.rollback().await?;
                return Err(AuthError::InvalidToken);
            }
        }

        let Some(user) = self.users.get_by_id(user_id).await? else {
            refresh_tokens::revoke_family(&mut tx, stored.family_id, now).await?;
            tx.commit().await?;
            return Err(AuthError::InvalidToken);
        };

        let pair = self
            .tokens
            .issue_in_family(&user, stored.family_id, now)
            .map_err(AuthError::Token)?;
        refresh_tokens::mark_replaced(&mut tx, stored.jti, pair.refresh_id, now).await?;
        refresh_tokens::insert(&mut tx, &new_row(&user, &pair)).await?;
        tx.commit().await?;

        tracing::debug!(user_id = %user.id, family_id = %pair.family_id, "Session refreshed");
        Ok((user, pair))
    }

    /// End the session a refresh token belongs to. Unusable tokens are ignored.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the database operation fails.
    pub async fn logout(&self, refresh_token: &str, now: DateTime<Utc>) -> Result<(), AuthError> {
        let Ok(claims) = self.tokens.decode_refresh(refresh_token, now) else {
            return Ok(());
        };
        let revoked = RefreshTokenRepository::new(self.pool)
            .revoke_family(claims.fam, now)
            .await?;
        tracing::info!(user_id = %claims.sub, family_id = %claims.fam, revoked, "User logged out");
        Ok(())
    }

    /// Change a user's display name.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidName` if the name is empty or too long.
    pub async fn update_name(&self, user_id: UserId, name: &str) -> Result<User, AuthError> {
        let name = validate_name(name)?;
        Ok(self.users.update_name(user_id, name).await?)
    }
}

/// What to do with a presented refresh token, given its stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rotation {
    Allowed,
    /// Rotated within the grace window by a concurrent request.
    Stale,
    /// Rotated earlier, or revoked: the token has leaked.
    Reused,
    /// Expired, or the row does not match the claims.
    Rejected,
}

fn check_rotation(
    stored: &StoredRefreshToken,
    claims: &RefreshClaims,
    user_id: UserId,
    now: DateTime<Utc>,
) -> Rotation {
    if stored.family_id != claims.fam || stored.user_id != user_id {
        return Rotation::Rejected;
    }
    if let Some(revoked_at) = stored.revoked_at {
        if stored.replaced_by.is_some() && now - revoked_at <= REUSE_GRACE {
            return Rotation::Stale;
        }
        return Rotation::Reused;
    }
    if stored.expires_at <= now {
        return Rotation::Rejected;
    }
    Rotation::Allowed
}

fn new_row(user: &User, pair: &TokenPair) -> NewRefreshToken {
    NewRefreshToken {
        jti: pair.refresh_id,
        family_id: pair.family_id,
        user_id: user.id,
        issued_at: pair.issued_at,
        expires_at: pair.refresh_expires_at,
    }
}

/// Validate a display name, returning it trimmed.
fn validate_name(name: &str) -> Result<&str, AuthError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AuthError::InvalidName("name is required".to_string()));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(AuthError::InvalidName(format!(
            "name must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(name)
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` if the password doesn't meet requirements,
/// or `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    validate_password(password)?;
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use tokens::TokenKind;

    fn row(now: DateTime<Utc>) -> StoredRefreshToken {
        StoredRefreshToken {
            jti: Uuid::new_v4(),
            family_id: Uuid::new_v4(),
            user_id: UserId::new(7),
            issued_at: now,
            expires_at: now + TimeDelta::days(7),
            revoked_at: None,
            replaced_by: None,
        }
    }

    fn claims_for(row: &StoredRefreshToken) -> RefreshClaims {
        RefreshClaims {
            sub: row.user_id.to_string(),
            jti: row.jti,
            fam: row.family_id,
            iat: row.issued_at.timestamp(),
            exp: row.expires_at.timestamp(),
            iss: tokens::ISSUER.to_string(),
            typ: TokenKind::Refresh,
        }
    }

    #[test]
    fn test_unrevoked_token_rotates() {
        let now = Utc::now();
        let stored = row(now);
        let claims = claims_for(&stored);
        assert_eq!(check_rotation(&stored, &claims, UserId::new(7), now), Rotation::Allowed);
    }

    #[test]
    fn test_recently_rotated_token_is_stale() {
        let now = Utc::now();
        let mut stored = row(now);
        stored.revoked_at = Some(now - TimeDelta::seconds(5));
        stored.replaced_by = Some(Uuid::new_v4());
        let claims = claims_for(&stored);
        assert_eq!(check_rotation(&stored, &claims, UserId::new(7), now), Rotation::Stale);
    }

    #[test]
    fn test_rotated_token_outside_grace_is_reuse() {
        let now = Utc::now();
        let mut stored = row(now);
        stored.revoked_at = Some(now - TimeDelta::seconds(31));
        stored.replaced_by = Some(Uuid::new_v4());
        let claims = claims_for(&stored);
        assert_eq!(check_rotation(&stored, &claims, UserId::new(7), now), Rotation::Reused);
    }

    #[test]
    fn test_logged_out_token_is_reuse() {
        let now = Utc::now();
        let mut stored = row(now);
        stored.revoked_at = Some(now);
        let claims = claims_for(&stored);
        assert_eq!(check_rotation(&stored, &claims, UserId::new(7), now), Rotation::Reused);
    }

    #[test]
    fn test_mismatched_row_is_rejected() {
        let now = Utc::now();
        let stored = row(now);
        let mut claims = claims_for(&stored);
        claims.fam = Uuid::new_v4();
        assert_eq!(check_rotation(&stored, &claims, UserId::new(7), now), Rotation::Rejected);

        let claims = claims_for(&stored);
        assert_eq!(check_rotation(&stored, &claims, UserId::new(8), now), Rotation::Rejected);
    }

    #[test]
    fn test_expired_row_is_rejected() {
        let now = Utc::now();
        let mut stored = row(now);
        stored.expires_at = now;
        let claims = claims_for(&stored);
        assert_eq!(check_rotation(&stored, &claims, UserId::new(7), now), Rotation::Rejected);
    }

    #[test]
    fn test_password_rules() {
        assert!(matches!(validate_password("short"), Err(AuthError::WeakPassword(_))));
        assert!(validate_password("long enough").is_ok());
        assert!(validate_password(&"x".repeat(MAX_PASSWORD_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_name_is_trimmed_and_required() {
        assert_eq!(validate_name("  Ada  ").unwrap(), "Ada");
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"n".repeat(MAX_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_hash_then_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("battery staple", &hash),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(verify_password("anything", "not-a-hash").is_err());
    }
}
