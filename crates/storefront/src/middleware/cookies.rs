//! Auth and preference cookies.
//!
//! `accessToken` and `refreshToken` are `HttpOnly`, `SameSite=Lax`, scoped to
//! `/`, and `Secure` when the site is served over https. Each lives as long
//! as the token inside it.

use std::time::Duration;

use axum::http::{HeaderMap, HeaderValue, header};
use tower_sessions::cookie::{Cookie, SameSite, time};

use crate::services::auth::{TokenIssuer, TokenPair};

/// Access token cookie name.
pub const ACCESS_COOKIE: &str = "accessToken";

/// Refresh token cookie name.
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Theme preference cookie name.
pub const THEME_COOKIE: &str = "theme";

/// Theme cookies last a year.
const THEME_MAX_AGE: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Read a cookie value from request headers. Later duplicates are ignored.
#[must_use]
pub fn read(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

/// Cookies carrying a freshly issued token pair.
#[must_use]
pub fn auth_cookies(pair: &TokenPair, tokens: &TokenIssuer, secure: bool) -> [Cookie<'static>; 2] {
    [
        http_only(ACCESS_COOKIE, pair.access_token.clone(), tokens.access_ttl(), secure),
        http_only(REFRESH_COOKIE, pair.refresh_token.clone(), tokens.refresh_ttl(), secure),
    ]
}

/// Cookies that delete both auth cookies.
#[must_use]
pub fn clear_auth_cookies(secure: bool) -> [Cookie<'static>; 2] {
    [removal(ACCESS_COOKIE, secure), removal(REFRESH_COOKIE, secure)]
}

/// Theme preference cookie. Readable by scripts so the page can apply it early.
#[must_use]
pub fn theme_cookie(theme: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((THEME_COOKIE, theme.to_string()))
        .path("/")
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age(THEME_MAX_AGE))
        .build()
}

/// Append `Set-Cookie` headers.
pub fn append<'c>(headers: &mut HeaderMap, cookies: impl IntoIterator<Item = Cookie<'c>>) {
    for cookie in cookies {
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!(cookie = cookie.name(), error = %e, "Unencodable cookie"),
        }
    }
}

/// Whether a response already sets the named cookie.
#[must_use]
pub fn sets_cookie(headers: &HeaderMap, name: &str) -> bool {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| Cookie::parse(value).ok())
        .any(|cookie| cookie.name() == name)
}

fn http_only(name: &'static str, value: String, ttl: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(secure)
        .max_age(max_age(ttl))
        .build()
}

fn removal(name: &'static str, secure: bool) -> Cookie<'static> {
    Cookie::build((name, ""))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(secure)
        .max_age(time::Duration::ZERO)
        .expires(time::OffsetDateTime::UNIX_EPOCH)
        .build()
}

fn max_age(ttl: Duration) -> time::Duration {
    time::Duration::seconds(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX))
}
