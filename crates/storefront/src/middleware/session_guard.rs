//! Edge verification of the access token cookie.
//!
//! Runs before every page and API handler:
//!
//! 1. Inspect `accessToken`. A valid token authenticates the request.
//! 2. An expiring token with a `refreshToken` cookie gets one silent refresh;
//!    if that fails the still-valid claims are used.
//! 3. An expired, invalid, or missing access token with a `refreshToken`
//!    cookie gets one refresh attempt; if the refresh token is rejected the
//!    request is anonymous and both cookies are cleared.
//! 4. The route rules in [`super::access`] decide whether the request goes on.
//! 5. Rotated cookies and the new `CSRF-Token` header are attached to the
//!    response, unless the handler set auth cookies itself.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use chrono::{DateTime, Utc};
use tracing::Span;

use super::access::{self, RouteDecision, has_segment_prefix};
use super::cookies::{self, ACCESS_COOKIE, REFRESH_COOKIE};
use super::csrf::CSRF_HEADER;
use crate::error::{AppError, set_sentry_user};
use crate::models::{CurrentUser, SessionRefreshed};
use crate::services::auth::{AuthError, AuthService, TokenPair, TokenStatus};
use crate::state::AppState;

/// Paths the guard never looks at.
const UNGUARDED: &[&str] = &["/static", "/health"];

/// Paths that manage the refresh cookie themselves.
const NO_SILENT_REFRESH: &[&str] = &["/api/auth/refresh", "/api/auth/logout", "/logout"];

/// What the cookies call for before any database work.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Plan {
    Authenticated(CurrentUser),
    Refresh {
        /// Identity to fall back on if the refresh fails.
        fallback: Option<CurrentUser>,
        /// CSRF claim of the access token being replaced.
        previous_csrf: Option<String>,
    },
    Anonymous {
        clear_cookies: bool,
    },
}

/// Result of verification, applied to the request and its response.
#[derive(Debug, Default)]
struct Verified {
    user: Option<CurrentUser>,
    refreshed: Option<TokenPair>,
    previous_csrf: Option<String>,
    clear_cookies: bool,
}

fn plan(status: Option<TokenStatus>, has_refresh: bool, may_refresh: bool) -> Plan {
    let refresh = has_refresh && may_refresh;
    match status {
        Some(TokenStatus::Valid(claims)) => claims
            .current_user()
            .map_or(Plan::Anonymous { clear_cookies: !has_refresh }, Plan::Authenticated),
        Some(TokenStatus::Expiring(claims)) => match claims.current_user() {
            Ok(user) if refresh => Plan::Refresh {
                previous_csrf: Some(claims.csrf),
                fallback: Some(user),
            },
            Ok(user) => Plan::Authenticated(user),
            Err(_) => Plan::Anonymous { clear_cookies: !has_refresh },
        },
        Some(TokenStatus::Expired(claims)) if refresh => Plan::Refresh {
            fallback: None,
            previous_csrf: Some(claims.csrf),
        },
        Some(TokenStatus::Expired(_) | TokenStatus::Invalid) if refresh => Plan::Refresh {
            fallback: None,
            previous_csrf: None,
        },
        Some(TokenStatus::Expired(_) | TokenStatus::Invalid) => Plan::Anonymous {
            clear_cookies: !has_refresh,
        },
        None if refresh => Plan::Refresh {
            fallback: None,
            previous_csrf: None,
        },
        None => Plan::Anonymous {
            clear_cookies: false,
        },
    }
}

async fn verify(state: &AppState, headers: &HeaderMap, path: &str, now: DateTime<Utc>) -> Verified {
    let access_token = cookies::read(headers, ACCESS_COOKIE);
    let refresh_token = cookies::read(headers, REFRESH_COOKIE);
    let status = access_token
        .as_deref()
        .map(|token| state.tokens().inspect_access(token, now));
    let may_refresh = !NO_SILENT_REFRESH.contains(&path);

    match (plan(status, refresh_token.is_some(), may_refresh), refresh_token) {
        (Plan::Authenticated(user), _) => Verified {
            user: Some(user),
            ..Verified::default()
        },
        (Plan::Anonymous { clear_cookies }, _) => Verified {
            clear_cookies,
            ..Verified::default()
        },
        (Plan::Refresh { .. }, None) => Verified::default(),
        (
            Plan::Refresh {
                fallback,
                previous_csrf,
            },
            Some(refresh_token),
        ) => {
            let auth = AuthService::new(state.pool(), state.tokens());
            match auth.refresh(&refresh_token, now).await {
                Ok((user, pair)) => Verified {
                    user: Some(pair.current_user(&user)),
                    refreshed: Some(pair),
                    previous_csrf,
                    clear_cookies: false,
                },
                Err(AuthError::InvalidToken) => Verified {
                    clear_cookies: fallback.is_none(),
                    user: fallback,
                    ..Verified::default()
                },
                Err(AuthError::StaleRefresh) => {
                    tracing::debug!("Concurrent refresh, serving request with current cookies");
                    Verified {
                        user: fallback,
                        ..Verified::default()
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Silent refresh failed");
                    Verified {
                        user: fallback,
                        ..Verified::default()
                    }
                }
            }
        }
    }
}

/// Verify the session cookies, enforce route access, and rotate tokens.
pub async fn session_guard_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if UNGUARDED.iter().any(|prefix| has_segment_prefix(&path, prefix)) {
        return next.run(request).await;
    }

    let verified = verify(&state, request.headers(), &path, Utc::now()).await;

    if let Some(user) = &verified.user {
        Span::current().record("user_id", tracing::field::display(user.id));
        set_sentry_user(&user.id, Some(&user.email));
    }

    let decision = access::decide(verified.user.as_ref().map(|u| u.role), &path);
    let mut response = match decision {
        RouteDecision::Allow => {
            if let Some(user) = verified.user.clone() {
                request.extensions_mut().insert(user);
            }
            if verified.refreshed.is_some() {
                request.extensions_mut().insert(SessionRefreshed {
                    previous_csrf: verified.previous_csrf.clone(),
                });
            }
            next.run(request).await
        }
        RouteDecision::Redirect(to) => Redirect::to(to).into_response(),
        RouteDecision::Onward(home) => {
            Redirect::to(&access::onward(request.uri().query(), home)).into_response()
        }
        RouteDecision::Login => {
            let target = request
                .uri()
                .path_and_query()
                .map_or(path.as_str(), |pq| pq.as_str());
            Redirect::to(&access::login_redirect(target)).into_response()
        }
        RouteDecision::Unauthorized => {
            AppError::Unauthorized("Authentication required".to_string()).into_response()
        }
        RouteDecision::Forbidden => {
            AppError::Forbidden("Admin access required".to_string()).into_response()
        }
    };

    attach_cookies(&state, &verified, response.headers_mut());
    response
}

fn attach_cookies(state: &AppState, verified: &Verified, headers: &mut HeaderMap) {
    if cookies::sets_cookie(headers, ACCESS_COOKIE) {
        return;
    }
    let secure = state.config().secure_cookies();
    if let Some(pair) = &verified.refreshed {
        cookies::append(headers, cookies::auth_cookies(pair, state.tokens(), secure));
        if let Ok(value) = HeaderValue::from_str(&pair.csrf_token) {
            headers.insert(CSRF_HEADER, value);
        }
    } else if verified.clear_cookies {
        cookies::append(headers, cookies::clear_auth_cookies(secure));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use shopfront_core::Role;

    use super::*;
    use crate::services::auth::tokens::{AccessClaims, ISSUER, TokenKind};

    fn claims(sub: &str) -> AccessClaims {
        AccessClaims {
            sub: sub.to_string(),
            email: "ada@example.com".to_string(),
            role: Role::Customer,
            csrf: "csrf-1".to_string(),
            iat: 0,
            exp: 900,
            iss: ISSUER.to_string(),
            typ: TokenKind::Access,
        }
    }

    #[test]
    fn test_valid_token_authenticates_without_refresh() {
        let plan = plan(Some(TokenStatus::Valid(claims("7"))), true, true);
        let Plan::Authenticated(user) = plan else {
            panic!("expected authenticated, got {plan:?}");
        };
        assert_eq!(user.id.as_i32(), 7);
        assert_eq!(user.csrf_token, "csrf-1");
    }

    #[test]
    fn test_expiring_token_refreshes_with_fallback() {
        let plan = plan(Some(TokenStatus::Expiring(claims("7"))), true, true);
        let Plan::Refresh { fallback, previous_csrf } = plan else {
            panic!("expected refresh, got {plan:?}");
        };
        assert_eq!(fallback.unwrap().id.as_i32(), 7);
        assert_eq!(previous_csrf.as_deref(), Some("csrf-1"));
    }

    #[test]
    fn test_expiring_token_without_refresh_cookie_is_still_accepted() {
        assert!(matches!(
            plan(Some(TokenStatus::Expiring(claims("7"))), false, true),
            Plan::Authenticated(_)
        ));
    }

    #[test]
    fn test_expired_or_invalid_token_refreshes_once() {
        assert_eq!(
            plan(Some(TokenStatus::Expired(claims("7"))), true, true),
            Plan::Refresh {
                fallback: None,
                previous_csrf: Some("csrf-1".to_string())
            }
        );
        assert_eq!(
            plan(Some(TokenStatus::Invalid), true, true),
            Plan::Refresh {
                fallback: None,
                previous_csrf: None
            }
        );
        assert_eq!(
            plan(None, true, true),
            Plan::Refresh {
                fallback: None,
                previous_csrf: None
            }
        );
    }

    #[test]
    fn test_dead_access_token_without_refresh_cookie_is_cleared() {
        assert_eq!(
            plan(Some(TokenStatus::Invalid), false, true),
            Plan::Anonymous { clear_cookies: true }
        );
        assert_eq!(
            plan(Some(TokenStatus::Expired(claims("7"))), false, true),
            Plan::Anonymous { clear_cookies: true }
        );
        assert_eq!(plan(None, false, true), Plan::Anonymous { clear_cookies: false });
    }

    #[test]
    fn test_refresh_endpoints_skip_silent_refresh() {
        assert_eq!(
            plan(Some(TokenStatus::Expired(claims("7"))), true, false),
            Plan::Anonymous {
                clear_cookies: false
            }
        );
        assert!(matches!(
            plan(Some(TokenStatus::Expiring(claims("7"))), true, false),
            Plan::Authenticated(_)
        ));
    }

    #[test]
    fn test_unparseable_subject_is_anonymous() {
        assert_eq!(
            plan(Some(TokenStatus::Valid(claims("not-a-number"))), false, true),
            Plan::Anonymous { clear_cookies: true }
        );
    }
}
