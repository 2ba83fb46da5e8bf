//! Security headers for every response.
//!
//! The policy is locked down: scripts and styles come only from `/static`,
//! forms post only to this origin, and nothing may frame the site. Product
//! images may come from any https host.

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderName, HeaderValue, header},
    middleware::Next,
    response::Response,
};

const CONTENT_SECURITY_POLICY: &str = "default-src 'none'; \
     script-src 'self'; \
     style-src 'self'; \
     font-src 'self'; \
     img-src 'self' https: data:; \
     connect-src 'self'; \
     frame-src 'none'; \
     object-src 'none'; \
     base-uri 'self'; \
     form-action 'self'; \
     frame-ancestors 'none'; \
     upgrade-insecure-requests";

const PERMISSIONS_POLICY: &str = "accelerometer=(), \
     autoplay=(), \
     browsing-topics=(), \
     camera=(), \
     display-capture=(), \
     encrypted-media=(), \
     fullscreen=(), \
     geolocation=(), \
     gyroscope=(), \
     hid=(), \
     idle-detection=(), \
     magnetometer=(), \
     microphone=(), \
     midi=(), \
     payment=(), \
     picture-in-picture=(), \
     publickey-credentials-get=(), \
     screen-wake-lock=(), \
     serial=(), \
     usb=(), \
     xr-spatial-tracking=()";

/// Headers set unconditionally.
///
/// `Referrer-Policy` is `same-origin` rather than `no-referrer` so form posts
/// keep a `Referer` for the CSRF origin check when `Origin` is absent.
const FIXED: &[(&str, &str)] = &[
    ("x-frame-options", "DENY"),
    ("x-content-type-options", "nosniff"),
    ("referrer-policy", "same-origin"),
    ("content-security-policy", CONTENT_SECURITY_POLICY),
    ("permissions-policy", PERMISSIONS_POLICY),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("cross-origin-embedder-policy", "credentialless"),
    ("x-dns-prefetch-control", "off"),
];

fn apply(headers: &mut HeaderMap) {
    for (name, value) in FIXED {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    // Pages carry per-user state; static assets set their own caching.
    if !headers.contains_key(header::CACHE_CONTROL) {
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, max-age=0"),
        );
    }
}

/// Add security headers to all responses.
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    apply(response.headers_mut());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_applied() {
        let mut headers = HeaderMap::new();
        apply(&mut headers);
        assert_eq!(headers["x-frame-options"], "DENY");
        assert_eq!(headers[header::CACHE_CONTROL], "no-store, max-age=0");
        assert!(
            headers["content-security-policy"]
                .to_str()
                .is_ok_and(|csp| csp.contains("script-src 'self';"))
        );
    }

    #[test]
    fn test_existing_cache_control_kept() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("public, max-age=3600"),
        );
        apply(&mut headers);
        assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=3600");
    }
}
