//! Route access rules by role.
//!
//! | path class | anonymous | customer | admin |
//! |---|---|---|---|
//! | guest-only (`/login`, `/register`) | allow | `next` or `/` | `next` or `/admin` |
//! | signed-in (`/account`, `/checkout`, `/orders`, and their `/api` twins) | login / 401 | allow | allow |
//! | admin (`/admin`, `/api/admin`) | login / 401 | redirect `/` / 403 | allow |
//! | everything else | allow | allow | allow |
//!
//! Prefixes match whole path segments: `/admin` covers `/admin` and
//! `/admin/orders`, never `/administrator`.

use shopfront_core::Role;

const GUEST_ONLY: &[&str] = &["/login", "/register"];

const SIGNED_IN: &[&str] = &[
    "/account",
    "/checkout",
    "/orders",
    "/api/account",
    "/api/orders",
    "/api/checkout",
];

const ADMIN: &[&str] = &["/admin", "/api/admin"];

/// What the guard should do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    /// Send the browser elsewhere (customers away from admin pages).
    Redirect(&'static str),
    /// Send a signed-in user on from a guest page: to the `next` query
    /// parameter if it is local, else to the given home.
    Onward(&'static str),
    /// Send the browser to the login page, remembering where it was going.
    Login,
    /// 401 for API callers without a session.
    Unauthorized,
    /// 403 for API callers lacking the role.
    Forbidden,
}

/// Which access rule a path falls under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    GuestOnly,
    SignedIn,
    Admin,
    Public,
}

/// Whether `path` is `prefix` itself or below it.
#[must_use]
pub fn has_segment_prefix(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

#[must_use]
pub fn is_api(path: &str) -> bool {
    has_segment_prefix(path, "/api")
}

#[must_use]
pub fn classify(path: &str) -> PathClass {
    let matches = |prefixes: &[&str]| prefixes.iter().any(|p| has_segment_prefix(path, p));
    if matches(ADMIN) {
        PathClass::Admin
    } else if matches(SIGNED_IN) {
        PathClass::SignedIn
    } else if matches(GUEST_ONLY) {
        PathClass::GuestOnly
    } else {
        PathClass::Public
    }
}

/// Decide how to route a request from a user with `role` (`None` if anonymous).
#[must_use]
pub fn decide(role: Option<Role>, path: &str) -> RouteDecision {
    let api = is_api(path);
    match (classify(path), role) {
        (PathClass::Public, _)
        | (PathClass::GuestOnly, None)
        | (PathClass::SignedIn, Some(_))
        | (PathClass::Admin, Some(Role::Admin)) => RouteDecision::Allow,

        (PathClass::GuestOnly, Some(role)) => RouteDecision::Onward(role.home_path()),

        (PathClass::SignedIn | PathClass::Admin, None) if api => RouteDecision::Unauthorized,
        (PathClass::SignedIn | PathClass::Admin, None) => RouteDecision::Login,

        (PathClass::Admin, Some(Role::Customer)) if api => RouteDecision::Forbidden,
        (PathClass::Admin, Some(Role::Customer)) => RouteDecision::Redirect(Role::Customer.home_path()),
    }
}

/// The login URL that returns to `path_and_query` afterwards.
#[must_use]
pub fn login_redirect(path_and_query: &str) -> String {
    if path_and_query == "/" {
        return "/login".to_string();
    }
    format!("/login?next={}", urlencoding::encode(path_and_query))
}

/// A post-login destination, accepted only if it stays on this site.
///
/// Local paths start with a single `/` and contain no backslash (browsers
/// treat `/\evil.com` like `//evil.com`). Anything else becomes `/`.
#[must_use]
pub fn safe_next(next: Option<&str>) -> String {
    match next {
        Some(n)
            if n.starts_with('/')
                && !n.starts_with("//")
                && !n.contains('\\')
                && !n.chars().any(char::is_control) =>
        {
            n.to_string()
        }
        _ => "/".to_string(),
    }
}

/// Where a signed-in user lands when opening a guest page with `query`.
///
/// Honours a local `next` parameter so a bounce through `/login` still
/// reaches the page that was asked for; otherwise falls back to `home`.
#[must_use]
pub fn onward(query: Option<&str>, home: &str) -> String {
    let next = query.and_then(|q| {
        url::form_urlencoded::parse(q.as_bytes())
            .find(|(key, _)| key == "next")
            .map(|(_, value)| value.into_owned())
    });
    match next.filter(|n| !n.is_empty()) {
        Some(next) => safe_next(Some(&next)),
        None => home.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CUSTOMER: Option<Role> = Some(Role::Customer);
    const ADMIN_ROLE: Option<Role> = Some(Role::Admin);

    #[test]
    fn test_public_paths_allow_everyone() {
        for role in [None, CUSTOMER, ADMIN_ROLE] {
            for path in ["/", "/products", "/products/blue-mug", "/cart", "/api/products"] {
                assert_eq!(decide(role, path), RouteDecision::Allow, "{role:?} {path}");
            }
        }
    }

    #[test]
    fn test_guest_pages_redirect_signed_in_users_home() {
        assert_eq!(decide(None, "/login"), RouteDecision::Allow);
        assert_eq!(decide(CUSTOMER, "/login"), RouteDecision::Onward("/"));
        assert_eq!(decide(ADMIN_ROLE, "/login"), RouteDecision::Onward("/admin"));
        assert_eq!(decide(CUSTOMER, "/register"), RouteDecision::Onward("/"));
    }

    #[test]
    fn test_signed_in_pages_require_login() {
        assert_eq!(decide(None, "/account"), RouteDecision::Login);
        assert_eq!(decide(None, "/account/addresses"), RouteDecision::Login);
        assert_eq!(decide(None, "/checkout"), RouteDecision::Login);
        assert_eq!(decide(None, "/orders/12"), RouteDecision::Login);
        assert_eq!(decide(CUSTOMER, "/account"), RouteDecision::Allow);
        assert_eq!(decide(ADMIN_ROLE, "/orders/12"), RouteDecision::Allow);
    }

    #[test]
    fn test_signed_in_api_returns_401() {
        assert_eq!(decide(None, "/api/orders"), RouteDecision::Unauthorized);
        assert_eq!(decide(None, "/api/checkout"), RouteDecision::Unauthorized);
        assert_eq!(decide(CUSTOMER, "/api/orders"), RouteDecision::Allow);
    }

    #[test]
    fn test_admin_pages() {
        assert_eq!(decide(None, "/admin"), RouteDecision::Login);
        assert_eq!(decide(None, "/admin/orders"), RouteDecision::Login);
        assert_eq!(decide(CUSTOMER, "/admin"), RouteDecision::Redirect("/"));
        assert_eq!(decide(CUSTOMER, "/admin/products/3"), RouteDecision::Redirect("/"));
        assert_eq!(decide(ADMIN_ROLE, "/admin/products/3"), RouteDecision::Allow);
    }

    #[test]
    fn test_admin_api() {
        assert_eq!(decide(None, "/api/admin/orders"), RouteDecision::Unauthorized);
        assert_eq!(decide(CUSTOMER, "/api/admin/orders"), RouteDecision::Forbidden);
        assert_eq!(decide(ADMIN_ROLE, "/api/admin/orders"), RouteDecision::Allow);
    }

    #[test]
    fn test_prefixes_match_whole_segments() {
        assert_eq!(classify("/administrator"), PathClass::Public);
        assert_eq!(classify("/accounting"), PathClass::Public);
        assert_eq!(classify("/login-help"), PathClass::Public);
        assert_eq!(classify("/admin/"), PathClass::Admin);
        assert!(!is_api("/apiary"));
        assert!(is_api("/api"));
    }

    #[test]
    fn test_login_redirect_keeps_destination() {
        assert_eq!(login_redirect("/"), "/login");
        assert_eq!(login_redirect("/account"), "/login?next=%2Faccount");
        assert_eq!(
            login_redirect("/orders/5?tab=items"),
            "/login?next=%2Forders%2F5%3Ftab%3Ditems"
        );
    }

    #[test]
    fn test_safe_next_accepts_local_paths_only() {
        assert_eq!(safe_next(Some("/account")), "/account");
        assert_eq!(safe_next(Some("/orders/5?tab=items")), "/orders/5?tab=items");
        assert_eq!(safe_next(Some("//evil.example")), "/");
        assert_eq!(safe_next(Some("/\\evil.example")), "/");
        assert_eq!(safe_next(Some("https://evil.example")), "/");
        assert_eq!(safe_next(Some("account")), "/");
        assert_eq!(safe_next(None), "/");
    }

    #[test]
    fn test_onward_prefers_local_next() {
        assert_eq!(onward(Some("next=%2Faccount%3Ftab%3D1"), "/"), "/account?tab=1");
        assert_eq!(onward(Some("next=/admin/orders"), "/admin"), "/admin/orders");
        assert_eq!(onward(Some("next=%2F%2Fevil.example"), "/"), "/");
        assert_eq!(onward(Some("next="), "/admin"), "/admin");
        assert_eq!(onward(Some("other=1"), "/admin"), "/admin");
        assert_eq!(onward(None, "/"), "/");
    }
}
