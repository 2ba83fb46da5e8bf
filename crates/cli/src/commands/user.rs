//! User management commands.
//!
//! ```bash
//! # Create an account (customer by default)
//! sf-cli user create -e ops@example.com -n "Ops" -p 'long enough password' -r admin
//!
//! # Give an existing account admin rights
//! sf-cli user promote -e ops@example.com
//! ```

use shopfront_core::{Email, Role, UserId};
use shopfront_storefront::db::{self, RepositoryError, UserRepository};
use shopfront_storefront::services::auth::{AuthError, hash_password};

use super::{CommandError, database_url};

/// Errors that can occur during user operations.
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Invalid role: {0}. Valid roles: customer, admin")]
    InvalidRole(String),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("User already exists with email: {0}")]
    UserExists(String),

    #[error("No user with email: {0}")]
    UnknownUser(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for UserError {
    fn from(e: sqlx::Error) -> Self {
        Self::Command(CommandError::Database(e))
    }
}

/// Create a user with a password.
///
/// # Returns
///
/// The ID of the created user.
///
/// # Errors
///
/// Returns an error for a bad role, email, or password, or when the email
/// is taken.
pub async fn create(
    email: &str,
    name: &str,
    password: &str,
    role: &str,
) -> Result<UserId, UserError> {
    let role: Role = role
        .parse()
        .map_err(|_| UserError::InvalidRole(role.to_owned()))?;
    let parsed = Email::parse(email).map_err(|_| UserError::InvalidEmail(email.to_owned()))?;
    let password_hash = hash_password(password)?;

    let pool = db::create_pool(&database_url()?).await?;

    tracing::info!("Creating user: {} ({})", parsed, role);
    let user = UserRepository::new(&pool)
        .create(&parsed, name.trim(), &password_hash, role)
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => UserError::UserExists(email.to_owned()),
            other => UserError::Repository(other),
        })?;

    tracing::info!(
        "User created. ID: {}, Email: {}, Role: {}",
        user.id,
        user.email,
        user.role
    );
    Ok(user.id)
}

/// Make an existing user an admin.
///
/// # Errors
///
/// Returns `UserError::UnknownUser` if nobody has this email.
pub async fn promote(email: &str) -> Result<(), UserError> {
    let parsed = Email::parse(email).map_err(|_| UserError::InvalidEmail(email.to_owned()))?;
    let pool = db::create_pool(&database_url()?).await?;

    let user = UserRepository::new(&pool)
        .set_role_by_email(&parsed, Role::Admin)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => UserError::UnknownUser(email.to_owned()),
            other => UserError::Repository(other),
        })?;

    tracing::info!("{} is now an admin (ID {})", user.email, user.id);
    Ok(())
}
