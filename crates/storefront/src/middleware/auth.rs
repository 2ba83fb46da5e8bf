//! Identity extractors.
//!
//! The session guard verifies the access token and stores a [`CurrentUser`]
//! in request extensions; these extractors read it back in handlers.

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};

use super::access::{is_api, login_redirect};
use crate::error::AppError;
use crate::models::CurrentUser;

/// Extractor that requires a signed-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn account(RequireUser(user): RequireUser) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
pub struct RequireUser(pub CurrentUser);

/// Extractor that requires a signed-in administrator.
pub struct RequireAdmin(pub CurrentUser);

/// Extractor for pages that work with or without a user.
pub struct OptionalUser(pub Option<CurrentUser>);

/// Why an identity extractor refused the request.
#[derive(Debug)]
pub enum AuthRejection {
    /// Page request without a user: go to login, then come back.
    RedirectToLogin(String),
    /// API request without a user.
    Unauthorized,
    /// Signed in, but not an administrator.
    Forbidden { api: bool },
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin(next) => Redirect::to(&login_redirect(&next)).into_response(),
            Self::Unauthorized => {
                AppError::Unauthorized("Authentication required".to_string()).into_response()
            }
            Self::Forbidden { api: true } => {
                AppError::Forbidden("Admin access required".to_string()).into_response()
            }
            Self::Forbidden { api: false } => Redirect::to("/").into_response(),
        }
    }
}

fn missing_user(parts: &Parts) -> AuthRejection {
    if is_api(parts.uri.path()) {
        AuthRejection::Unauthorized
    } else {
        let next = parts
            .uri
            .path_and_query()
            .map_or_else(|| parts.uri.path().to_string(), ToString::to_string);
        AuthRejection::RedirectToLogin(next)
    }
}

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .map(Self)
            .ok_or_else(|| missing_user(parts))
    }
}

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| missing_user(parts))?;
        if user.is_admin() {
            Ok(Self(user))
        } else {
            Err(AuthRejection::Forbidden {
                api: is_api(parts.uri.path()),
            })
        }
    }
}

impl<S> FromRequestParts<S> for OptionalUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<CurrentUser>().cloned()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::{Request, StatusCode, header};
    use shopfront_core::{Role, UserId};

    use super::*;

    fn parts(uri: &str, user: Option<CurrentUser>) -> Parts {
        let (mut parts, ()) = Request::builder().uri(uri).body(()).unwrap().into_parts();
        if let Some(user) = user {
            parts.extensions.insert(user);
        }
        parts
    }

    fn user(role: Role) -> CurrentUser {
        CurrentUser {
            id: UserId::new(3),
            email: "ada@example.com".to_string(),
            role,
            csrf_token: "t".to_string(),
            expires_at: 0,
        }
    }

    #[tokio::test]
    async fn test_require_user_redirects_pages_to_login() {
        let mut p = parts("/account/addresses?x=1", None);
        let Err(rejection) = RequireUser::from_request_parts(&mut p, &()).await else {
            panic!("expected rejection");
        };
        let response = rejection.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/login?next=%2Faccount%2Faddresses%3Fx%3D1"
        );
    }

    #[tokio::test]
    async fn test_require_user_returns_401_for_api() {
        let mut p = parts("/api/orders", None);
        let Err(rejection) = RequireUser::from_request_parts(&mut p, &()).await else {
            panic!("expected rejection");
        };
        assert_eq!(rejection.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_require_admin_checks_role() {
        let mut p = parts("/api/admin/orders", Some(user(Role::Customer)));
        let Err(rejection) = RequireAdmin::from_request_parts(&mut p, &()).await else {
            panic!("expected rejection");
        };
        assert_eq!(rejection.into_response().status(), StatusCode::FORBIDDEN);

        let mut p = parts("/admin", Some(user(Role::Admin)));
        assert!(RequireAdmin::from_request_parts(&mut p, &()).await.is_ok());
    }

    #[tokio::test]
    async fn test_optional_user() {
        let mut p = parts("/", None);
        let OptionalUser(found) = OptionalUser::from_request_parts(&mut p, &()).await.unwrap();
        assert!(found.is_none());

        let mut p = parts("/", Some(user(Role::Customer)));
        let OptionalUser(found) = OptionalUser::from_request_parts(&mut p, &()).await.unwrap();
        assert_eq!(found.unwrap().id, UserId::new(3));
    }
}
