//! Unified error handling with Sentry integration.
//!
//! API handlers return `Result<T, AppError>`, which responds with JSON
//! `{ "error": <message> }`. Page handlers return `Result<T, PageError>`,
//! which renders the error page with a Retry link. Server errors are
//! captured to Sentry before responding; their details never reach clients.

use askama::Template;
use axum::{
    Json,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::cart::CartError;
use crate::services::checkout::{CheckoutError, CouponError};
use crate::services::protection::ShieldDenial;
use crate::services::reviews::ReviewError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Order placement or coupon validation failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Invalid cart edit.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Review submission failed.
    #[error("Review error: {0}")]
    Review(#[from] ReviewError),

    /// The request shield refused the request.
    #[error("Shield: {0}")]
    Shield(#[from] ShieldDenial),

    /// Session store failure.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

const INTERNAL_MESSAGE: &str = "Something went wrong on our end";
const UNAVAILABLE_MESSAGE: &str = "The service is temporarily unavailable";

fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) => StatusCode::CONFLICT,
        e if e.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn repository_message(err: &RepositoryError) -> String {
    match err {
        RepositoryError::NotFound => "Not found".to_string(),
        RepositoryError::Conflict(msg) => sentence(msg),
        e if e.is_unavailable() => UNAVAILABLE_MESSAGE.to_string(),
        _ => INTERNAL_MESSAGE.to_string(),
    }
}

/// Capitalize the first letter of a message for display.
pub(crate) fn sentence(msg: &str) -> String {
    let mut chars = msg.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => repository_status(err),
            Self::Auth(err) => match err {
                AuthError::InvalidEmail(_)
                | AuthError::WeakPassword(_)
                | AuthError::InvalidName(_) => StatusCode::BAD_REQUEST,
                AuthError::InvalidCredentials | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists | AuthError::StaleRefresh => StatusCode::CONFLICT,
                AuthError::Repository(err) => repository_status(err),
                AuthError::Token(_) | AuthError::PasswordHash => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart => StatusCode::BAD_REQUEST,
                CheckoutError::ProductUnavailable(_) | CheckoutError::InsufficientStock { .. } => {
                    StatusCode::CONFLICT
                }
                CheckoutError::Coupon(CouponError::NotFound) => StatusCode::NOT_FOUND,
                CheckoutError::Coupon(_) => StatusCode::BAD_REQUEST,
                CheckoutError::Repository(err) => repository_status(err),
            },
            Self::Review(ReviewError::Repository(err)) => repository_status(err),
            Self::Review(_) | Self::Cart(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Shield(ShieldDenial::RateLimited) | Self::RateLimited => {
                StatusCode::TOO_MANY_REQUESTS
            }
            Self::Shield(_) | Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show the user.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(err) | Self::Auth(AuthError::Repository(err)) => repository_message(err),
            Self::Checkout(CheckoutError::Repository(err))
            | Self::Review(ReviewError::Repository(err)) => repository_message(err),
            Self::Auth(AuthError::InvalidEmail(_)) => "Invalid email address".to_string(),
            Self::Auth(err) if err.is_client_error() => sentence(&err.to_string()),
            Self::Checkout(err) => sentence(&err.to_string()),
            Self::Cart(err) => sentence(&err.to_string()),
            Self::Review(err) => sentence(&err.to_string()),
            Self::Shield(err) => sentence(&err.to_string()),
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg)
            | Self::Conflict(msg) => msg.clone(),
            Self::RateLimited => "Too many requests, please slow down".to_string(),
            Self::Auth(_) | Self::Session(_) | Self::Internal(_) => INTERNAL_MESSAGE.to_string(),
        }
    }

    /// Log server-side failures and send them to Sentry.
    fn report(&self, status: StatusCode) {
        if status.is_server_error() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                status = status.as_u16(),
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        self.report(status);
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Error page shown for failed page requests.
#[derive(Template)]
#[template(path = "error.html")]
struct ErrorPageTemplate<'a> {
    status: u16,
    title: &'a str,
    message: &'a str,
    retry: bool,
}

/// An `AppError` rendered as an HTML page.
#[derive(Debug)]
pub struct PageError(pub AppError);

macro_rules! page_error_from {
    ($($source:ty),+ $(,)?) => {
        $(impl From<$source> for PageError {
            fn from(err: $source) -> Self {
                Self(AppError::from(err))
            }
        })+
    };
}

page_error_from!(
    RepositoryError,
    AuthError,
    CheckoutError,
    CartError,
    ReviewError,
    ShieldDenial,
    tower_sessions::session::Error,
);

impl From<AppError> for PageError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        self.0.report(status);
        let message = self.0.public_message();
        let page = ErrorPageTemplate {
            status: status.as_u16(),
            title: status.canonical_reason().unwrap_or("Error"),
            message: &message,
            retry: status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS,
        };
        let body = page
            .render()
            .unwrap_or_else(|e| format!("Template error: {e}"));
        (status, Html(body)).into_response()
    }
}

/// Result type alias for page handlers.
pub type PageResult<T> = std::result::Result<T, PageError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Order placed", Some(&[("order_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::services::protection::EmailRejection;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_sentence() {
        assert_eq!(sentence("your cart is empty"), "Your cart is empty");
        assert_eq!(sentence("Already fine"), "Already fine");
        assert_eq!(sentence(""), "");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(get_status(AppError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(get_status(AppError::Unauthorized("x".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(get_status(AppError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(get_status(AppError::BadRequest("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(get_status(AppError::Conflict("x".into())), StatusCode::CONFLICT);
        assert_eq!(get_status(AppError::RateLimited), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            get_status(AppError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_domain_error_statuses() {
        assert_eq!(
            get_status(AuthError::InvalidCredentials.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(get_status(AuthError::UserAlreadyExists.into()), StatusCode::CONFLICT);
        assert_eq!(
            get_status(AuthError::WeakPassword("short".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(get_status(CheckoutError::EmptyCart.into()), StatusCode::BAD_REQUEST);
        assert_eq!(
            get_status(
                CheckoutError::InsufficientStock {
                    product: "Mug".into(),
                    available: 1
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(CheckoutError::Coupon(CouponError::NotFound).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(CheckoutError::Coupon(CouponError::MinimumNotMet(Decimal::TEN)).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(get_status(ShieldDenial::Bot("curl").into()), StatusCode::FORBIDDEN);
        assert_eq!(
            get_status(ShieldDenial::Email(EmailRejection::Disposable).into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(ShieldDenial::RateLimited.into()),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(get_status(RepositoryError::NotFound.into()), StatusCode::NOT_FOUND);
        assert_eq!(
            get_status(RepositoryError::Database(sqlx::Error::PoolTimedOut).into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_json_body_hides_internal_details() {
        let response = AppError::Internal("connection string leaked".into()).into_response();
        let body = body_json(response).await;
        assert_eq!(body["error"], INTERNAL_MESSAGE);

        let response = AppError::from(CheckoutError::InsufficientStock {
            product: "Blue Mug".into(),
            available: 2,
        })
        .into_response();
        let body = body_json(response).await;
        assert_eq!(body["error"], "Only 2 of Blue Mug left in stock");
    }

    #[tokio::test]
    async fn test_page_error_offers_retry_for_server_errors() {
        let response = PageError(AppError::Internal("boom".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("data-retry"));
        assert!(!html.contains("boom"));

        let response = PageError(AppError::NotFound("No such product".into())).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("No such product"));
        assert!(!html.contains("data-retry"));
    }
}
