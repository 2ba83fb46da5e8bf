//! Authentication route handlers.
//!
//! Login and registration issue the `accessToken`/`refreshToken` cookie pair;
//! logout revokes the refresh token family and clears both cookies.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::{Extensions, HeaderMap},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, PageResult, clear_sentry_user, set_sentry_user};
use crate::middleware::access::safe_next;
use crate::middleware::cookies::{self, REFRESH_COOKIE};
use crate::middleware::{client_ip, user_agent};
use crate::models::User;
use crate::services::auth::{AuthService, TokenPair};
use crate::state::AppState;
use crate::views::PageContext;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub next: Option<String>,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub next: Option<String>,
}

/// Where to go after signing in.
#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub ctx: PageContext,
    pub next: String,
    pub email: String,
    pub error: Option<String>,
}

/// Registration page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub ctx: PageContext,
    pub next: String,
    pub name: String,
    pub email: String,
    pub error: Option<String>,
}

/// Redirect with the session cookies for a freshly signed-in user.
///
/// The session id is cycled so a session fixed before sign-in can't be
/// reused afterwards; the cart it holds carries over.
async fn signed_in(
    state: &AppState,
    session: &Session,
    user: &User,
    pair: &TokenPair,
    next: Option<&str>,
) -> PageResult<Response> {
    session.cycle_id().await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));

    let destination = match next.filter(|n| !n.is_empty()) {
        Some(next) => safe_next(Some(next)),
        None => user.role.home_path().to_string(),
    };
    let mut response = Redirect::to(&destination).into_response();
    cookies::append(
        response.headers_mut(),
        cookies::auth_cookies(pair, state.tokens(), state.config().secure_cookies()),
    );
    Ok(response)
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(ctx: PageContext, Query(query): Query<NextQuery>) -> LoginTemplate {
    LoginTemplate {
        ctx,
        next: query.next.unwrap_or_default(),
        email: String::new(),
        error: None,
    }
}

/// Handle login form submission.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
    Form(form): Form<LoginForm>,
) -> PageResult<Response> {
    let result = AuthService::new(state.pool(), state.tokens())
        .login(&form.email, &form.password, Utc::now())
        .await;

    match result {
        Ok((user, pair)) => signed_in(&state, &session, &user, &pair, form.next.as_deref()).await,
        Err(err) => {
            let err = AppError::from(err);
            if err.status().is_server_error() {
                return Err(err.into());
            }
            tracing::info!(reason = %err, "Login failed");
            let page = LoginTemplate {
                ctx,
                next: form.next.unwrap_or_default(),
                email: form.email,
                error: Some(err.public_message()),
            };
            Ok((err.status(), page).into_response())
        }
    }
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(ctx: PageContext, Query(query): Query<NextQuery>) -> RegisterTemplate {
    RegisterTemplate {
        ctx,
        next: query.next.unwrap_or_default(),
        name: String::new(),
        email: String::new(),
        error: None,
    }
}

/// Screen, create, and sign in a new customer.
async fn create_account(
    state: &AppState,
    headers: &HeaderMap,
    extensions: &Extensions,
    form: &RegisterForm,
) -> Result<(User, TokenPair), AppError> {
    if form.password != form.password_confirm {
        return Err(AppError::BadRequest("Passwords do not match".to_string()));
    }
    let email = state.shield().protect_signup(
        client_ip(headers, extensions),
        user_agent(headers),
        &form.email,
    )?;

    let auth = AuthService::new(state.pool(), state.tokens());
    auth.register(&form.name, email.as_str(), &form.password).await?;
    Ok(auth.login(email.as_str(), &form.password, Utc::now()).await?)
}

/// Handle registration form submission.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
    headers: HeaderMap,
    extensions: Extensions,
    Form(form): Form<RegisterForm>,
) -> PageResult<Response> {
    match create_account(&state, &headers, &extensions, &form).await {
        Ok((user, pair)) => signed_in(&state, &session, &user, &pair, form.next.as_deref()).await,
        Err(err) if err.status().is_server_error() => Err(err.into()),
        Err(err) => {
            let page = RegisterTemplate {
                ctx,
                next: form.next.unwrap_or_default(),
                name: form.name,
                email: form.email,
                error: Some(err.public_message()),
            };
            Ok((err.status(), page).into_response())
        }
    }
}

// =============================================================================
// Logout Route
// =============================================================================

/// Handle logout.
///
/// Revokes the refresh token family, clears the auth cookies, and drops the
/// server-side session (and with it the cart).
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

    let mut response = Redirect::to("/").into_response();
    cookies::append(
        response.headers_mut(),
        cookies::clear_auth_cookies(state.config().secure_cookies()),
    );
    response
}
