//! Session API.
//!
//! JSON twins of the login, registration, and logout pages, plus the two
//! endpoints the page script polls: `GET /api/auth/session` and
//! `POST /api/auth/refresh`.

use axum::{
    Json,
    extract::State,
    http::{Extensions, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use shopfront_core::{Role, UserId};

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::cookies::{self, REFRESH_COOKIE};
use crate::middleware::{CSRF_HEADER, OptionalUser, client_ip, user_agent};
use crate::models::{CurrentUser, User};
use crate::services::auth::{AuthError, AuthService, TokenPair};
use crate::state::AppState;

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Registration request body.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// The signed-in identity as the page script sees it.
#[derive(Debug, Clone, Serialize)]
pub struct SessionUser {
    pub id: UserId,
    pub email: String,
    pub role: Role,
}

impl From<&CurrentUser> for SessionUser {
    fn from(user: &CurrentUser) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Session state returned by every endpoint here.
#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    pub user: Option<SessionUser>,
    /// Unix time at which the access token expires.
    pub expires_at: Option<i64>,
    pub csrf_token: Option<String>,
    /// Seconds before expiry at which the script should refresh.
    pub refresh_threshold: u64,
}

impl SessionResponse {
    #[must_use]
    pub fn new(user: Option<&CurrentUser>, state: &AppState) -> Self {
        Self {
            authenticated: user.is_some(),
            user: user.map(SessionUser::from),
            expires_at: user.map(|u| u.expires_at),
            csrf_token: user.map(|u| u.csrf_token.clone()),
            refresh_threshold: state.tokens().refresh_threshold().as_secs(),
        }
    }
}

/// A JSON session response that also sets fresh auth cookies.
fn issued(state: &AppState, status: StatusCode, user: &User, pair: &TokenPair) -> Response {
    let current = pair.current_user(user);
    set_sentry_user(&user.id, Some(user.email.as_str()));

    let mut response = (status, Json(SessionResponse::new(Some(&current), state))).into_response();
    cookies::append(
        response.headers_mut(),
        cookies::auth_cookies(pair, state.tokens(), state.config().secure_cookies()),
    );
    if let Ok(value) = HeaderValue::from_str(&pair.csrf_token) {
        response.headers_mut().insert(CSRF_HEADER, value);
    }
    response
}

/// A response that clears both auth cookies.
fn cleared(state: &AppState, response: impl IntoResponse) -> Response {
    let mut response = response.into_response();
    cookies::append(
        response.headers_mut(),
        cookies::clear_auth_cookies(state.config().secure_cookies()),
    );
    response
}

/// POST /api/auth/login
///
/// # Errors
///
/// Returns 401 for bad credentials.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> Result<Response> {
    let (user, pair) = AuthService::new(state.pool(), state.tokens())
        .login(&body.email, &body.password, Utc::now())
        .await?;
    session.cycle_id().await?;
    Ok(issued(&state, StatusCode::OK, &user, &pair))
}

/// POST /api/auth/register
///
/// # Errors
///
/// Returns 403/429 when the shield refuses the signup, 400 for invalid
/// input, and 409 if the email is taken.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    extensions: Extensions,
    Json(body): Json<RegisterRequest>,
) -> Result<Response> {
    let email = state.shield().protect_signup(
        client_ip(&headers, &extensions),
        user_agent(&headers),
        &body.email,
    )?;

    let auth = AuthService::new(state.pool(), state.tokens());
    auth.register(&body.name, email.as_str(), &body.password).await?;
    let (user, pair) = auth.login(email.as_str(), &body.password, Utc::now()).await?;
    session.cycle_id().await?;
    Ok(issued(&state, StatusCode::CREATED, &user, &pair))
}

/// POST /api/auth/refresh
///
/// Rotates the refresh cookie. A concurrent rotation by another tab answers
/// 409 and leaves the cookies alone; an unusable token answers 401 and clears
/// them.
///
/// # Errors
///
/// Returns 401 without a usable refresh cookie, 409 on a concurrent refresh.
#[instrument(skip_all)]
pub async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    let Some(token) = cookies::read(&headers, REFRESH_COOKIE) else {
        return Err(AppError::Unauthorized("No session to refresh".to_string()));
    };

    match AuthService::new(state.pool(), state.tokens())
        .refresh(&token, Utc::now())
        .await
    {
        Ok((user, pair)) => Ok(issued(&state, StatusCode::OK, &user, &pair)),
        Err(AuthError::InvalidToken) => Ok(cleared(&state, AppError::Auth(AuthError::InvalidToken))),
        Err(err) => Err(err.into()),
    }
}

/// POST /api/auth/logout
#[instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, session: Session, headers: HeaderMap) -> Response {
    if let Some(token) = cookies::read(&headers, REFRESH_COOKIE)
        && let Err(e) = AuthService::new(state.pool(), state.tokens())
            .logout(&token, Utc::now())
            .await
    {
        tracing::warn!(error = %e, "Failed to revoke refresh token on logout");
    }
    if let Err(e) = session.flush().await {
        tracing::error!(error = %e, "Failed to flush session");
    }
    clear_sentry_user();
    cleared(&state, StatusCode::NO_CONTENT)
}

/// GET /api/auth/session
///
/// Reports the identity the session guard verified for this request. When
/// the guard rotated tokens on the way in, the response already carries the
/// new cookies and `CSRF-Token` header.
pub async fn session(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
) -> Json<SessionResponse> {
    Json(SessionResponse::new(user.as_ref(), &state))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_user_omits_csrf() {
        let user = CurrentUser {
            id: UserId::new(3),
            email: "ada@example.com".to_string(),
            role: Role::Customer,
            csrf_token: "secret".to_string(),
            expires_at: 1_700_000_000,
        };
        let json = serde_json::to_value(SessionUser::from(&user)).unwrap_or_default();
        assert_eq!(json["email"], "ada@example.com");
        assert_eq!(json["role"], "customer");
        assert!(json.get("csrf_token").is_none());
    }
}
