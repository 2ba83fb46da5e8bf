//! Cross-site request forgery checks for state-changing requests.
//!
//! Scripts calling `/api/...` on behalf of a signed-in user send the access
//! token's `csrf` claim in the `CSRF-Token` header. Form posts and anonymous
//! API calls are checked against `Origin` (or `Referer`) instead.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, Method, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::access::is_api;
use crate::error::AppError;
use crate::models::{CurrentUser, SessionRefreshed};
use crate::state::AppState;

/// Header carrying the CSRF token, in both directions.
pub const CSRF_HEADER: &str = "csrf-token";

/// Endpoints reachable before a CSRF token exists.
const EXEMPT: &[&str] = &["/api/auth/login", "/api/auth/register", "/api/auth/refresh"];

/// Outcome of a CSRF check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrfVerdict {
    Pass,
    BadToken,
    CrossSite,
}

#[must_use]
pub fn is_state_changing(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Check a state-changing request.
///
/// `user` is the identity the session guard attached; `previous_csrf` is the
/// claim of the token it replaced during this request, if any.
#[must_use]
pub fn check(
    path: &str,
    headers: &HeaderMap,
    user: Option<&CurrentUser>,
    previous_csrf: Option<&str>,
    origin: &str,
) -> CsrfVerdict {
    if EXEMPT.contains(&path) {
        return CsrfVerdict::Pass;
    }

    if let (true, Some(user)) = (is_api(path), user) {
        let Some(sent) = headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok()) else {
            return CsrfVerdict::BadToken;
        };
        let accepted = constant_time_eq(sent, &user.csrf_token)
            || previous_csrf.is_some_and(|prev| constant_time_eq(sent, prev));
        return if accepted {
            CsrfVerdict::Pass
        } else {
            CsrfVerdict::BadToken
        };
    }

    if same_origin(headers, origin) {
        CsrfVerdict::Pass
    } else {
        CsrfVerdict::CrossSite
    }
}

/// Whether `Origin`, or failing that `Referer`, names this site.
///
/// Requests carrying neither header pass: they are not from a browser that
/// would attach our cookies cross-site.
fn same_origin(headers: &HeaderMap, origin: &str) -> bool {
    if let Some(sent) = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok()) {
        return sent.trim_end_matches('/') == origin;
    }
    if let Some(referer) = headers.get(header::REFERER).and_then(|v| v.to_str().ok()) {
        return url::Url::parse(referer)
            .is_ok_and(|url| url.origin().ascii_serialization() == origin);
    }
    true
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a.bytes()
            .zip(b.bytes())
            .fold(0u8, |acc, (x, y)| acc | (x ^ y))
            == 0
}

/// Reject state-changing requests that fail the CSRF check.
///
/// Must run inside the session guard, which supplies the identity.
pub async fn csrf_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !is_state_changing(request.method()) {
        return next.run(request).await;
    }

    let verdict = check(
        request.uri().path(),
        request.headers(),
        request.extensions().get::<CurrentUser>(),
        request
            .extensions()
            .get::<SessionRefreshed>()
            .and_then(|r| r.previous_csrf.as_deref()),
        &state.config().origin(),
    );

    match verdict {
        CsrfVerdict::Pass => next.run(request).await,
        CsrfVerdict::BadToken => {
            tracing::warn!(path = %request.uri().path(), "CSRF token mismatch");
            AppError::Forbidden("Invalid CSRF token".to_string()).into_response()
        }
        CsrfVerdict::CrossSite => {
            tracing::warn!(path = %request.uri().path(), "Cross-site request blocked");
            AppError::Forbidden("Cross-site request blocked".to_string()).into_response()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;
    use shopfront_core::{Role, UserId};

    use super::*;

    const ORIGIN: &str = "https://shop.example";

    fn user() -> CurrentUser {
        CurrentUser {
            id: UserId::new(1),
            email: "ada@example.com".to_string(),
            role: Role::Customer,
            csrf_token: "current".to_string(),
            expires_at: 0,
        }
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn test_api_requires_matching_header() {
        let u = user();
        assert_eq!(
            check("/api/orders", &headers(&[]), Some(&u), None, ORIGIN),
            CsrfVerdict::BadToken
        );
        assert_eq!(
            check("/api/orders", &headers(&[(CSRF_HEADER, "wrong")]), Some(&u), None, ORIGIN),
            CsrfVerdict::BadToken
        );
        assert_eq!(
            check("/api/orders", &headers(&[(CSRF_HEADER, "current")]), Some(&u), None, ORIGIN),
            CsrfVerdict::Pass
        );
    }

    #[test]
    fn test_previous_token_accepted_during_rotation() {
        let u = user();
        let h = headers(&[(CSRF_HEADER, "old")]);
        assert_eq!(
            check("/api/cart", &h, Some(&u), Some("old"), ORIGIN),
            CsrfVerdict::Pass
        );
        assert_eq!(check("/api/cart", &h, Some(&u), None, ORIGIN), CsrfVerdict::BadToken);
    }

    #[test]
    fn test_auth_endpoints_are_exempt() {
        let u = user();
        for path in ["/api/auth/login", "/api/auth/register", "/api/auth/refresh"] {
            assert_eq!(
                check(path, &headers(&[("origin", "https://evil.example")]), Some(&u), None, ORIGIN),
                CsrfVerdict::Pass
            );
        }
        assert_eq!(
            check("/api/auth/logout", &headers(&[]), Some(&u), None, ORIGIN),
            CsrfVerdict::BadToken
        );
    }

    #[test]
    fn test_forms_check_origin() {
        let u = user();
        assert_eq!(
            check("/cart/add", &headers(&[("origin", ORIGIN)]), Some(&u), None, ORIGIN),
            CsrfVerdict::Pass
        );
        assert_eq!(
            check("/cart/add", &headers(&[("origin", "https://evil.example")]), None, None, ORIGIN),
            CsrfVerdict::CrossSite
        );
        assert_eq!(
            check(
                "/account",
                &headers(&[("referer", "https://shop.example/account?tab=1")]),
                Some(&u),
                None,
                ORIGIN
            ),
            CsrfVerdict::Pass
        );
        assert_eq!(
            check(
                "/account",
                &headers(&[("referer", "https://shop.example.evil.example/")]),
                Some(&u),
                None,
                ORIGIN
            ),
            CsrfVerdict::CrossSite
        );
        assert_eq!(check("/logout", &headers(&[]), None, None, ORIGIN), CsrfVerdict::Pass);
    }

    #[test]
    fn test_anonymous_api_falls_back_to_origin() {
        assert_eq!(
            check("/api/cart", &headers(&[("origin", "https://evil.example")]), None, None, ORIGIN),
            CsrfVerdict::CrossSite
        );
        assert_eq!(check("/api/cart", &headers(&[]), None, None, ORIGIN), CsrfVerdict::Pass);
    }

    #[test]
    fn test_safe_methods_are_not_state_changing() {
        assert!(!is_state_changing(&Method::GET));
        assert!(!is_state_changing(&Method::HEAD));
        assert!(!is_state_changing(&Method::OPTIONS));
        assert!(is_state_changing(&Method::DELETE));
    }
}
