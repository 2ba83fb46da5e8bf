//! End-to-end session lifecycle against a running storefront.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`sf-cli migrate`)
//! - The storefront running (`cargo run -p shopfront-storefront`)
//!
//! Run with: `cargo test -p shopfront-integration-tests -- --ignored`

#![allow(clippy::unwrap_used)]

use reqwest::{Client, Response, StatusCode, header};
use serde_json::{Value, json};

use shopfront_integration_tests::BROWSER_UA;

/// Base URL for the storefront (configurable via environment).
fn base_url() -> String {
    std::env::var("SHOPFRONT_TEST_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// A client that manages cookies by hand so tests can replay old ones.
fn client() -> Client {
    Client::builder()
        .user_agent(BROWSER_UA)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}

fn unique_email() -> String {
    format!(
        "live-{}@shop.test",
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    )
}

/// Value of the named cookie among the response's `Set-Cookie` headers.
fn cookie(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(n, _)| *n == name)
        .map(|(_, v)| v.to_string())
}

fn csrf_header(response: &Response) -> Option<String> {
    response
        .headers()
        .get("csrf-token")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_register_refresh_reuse_and_logout() {
    let client = client();
    let base = base_url();

    // Register: both cookies plus a CSRF token.
    let resp = client
        .post(format!("{base}/api/auth/register"))
        .json(&json!({
            "name": "Live Test",
            "email": unique_email(),
            "password": "correct horse battery staple",
        }))
        .send()
        .await
        .expect("Failed to register");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let access = cookie(&resp, "accessToken").expect("access cookie");
    let first_refresh = cookie(&resp, "refreshToken").expect("refresh cookie");
    let csrf = csrf_header(&resp).expect("CSRF header");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["csrf_token"], csrf.as_str());

    // The access token alone is enough for protected reads.
    let resp = client
        .get(format!("{base}/api/orders"))
        .header(header::COOKIE, format!("accessToken={access}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // Rotate.
    let resp = client
        .post(format!("{base}/api/auth/refresh"))
        .header(header::COOKIE, format!("refreshToken={first_refresh}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let second_refresh = cookie(&resp, "refreshToken").expect("rotated refresh cookie");
    let rotated_csrf = csrf_header(&resp).expect("rotated CSRF header");
    assert_ne!(second_refresh, first_refresh);
    assert_ne!(rotated_csrf, csrf);

    // Replaying the old token right away looks like a second tab racing us.
    let resp = client
        .post(format!("{base}/api/auth/refresh"))
        .header(header::COOKIE, format!("refreshToken={first_refresh}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert!(cookie(&resp, "refreshToken").is_none());

    // Logout revokes the family.
    let resp = client
        .post(format!("{base}/api/auth/logout"))
        .header(
            header::COOKIE,
            format!("accessToken={access}; refreshToken={second_refresh}"),
        )
        .header("CSRF-Token", csrf.as_str())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = client
        .post(format!("{base}/api/auth/refresh"))
        .header(header::COOKIE, format!("refreshToken={second_refresh}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(cookie(&resp, "refreshToken").as_deref(), Some(""));
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_silent_refresh_restores_an_expired_session() {
    let client = client();
    let base = base_url();

    let resp = client
        .post(format!("{base}/api/auth/register"))
        .json(&json!({
            "name": "Silent Refresh",
            "email": unique_email(),
            "password": "correct horse battery staple",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let refresh = cookie(&resp, "refreshToken").expect("refresh cookie");

    // No access cookie at all: the guard refreshes on the way in.
    let resp = client
        .get(format!("{base}/account"))
        .header(header::COOKIE, format!("refreshToken={refresh}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(cookie(&resp, "accessToken").is_some_and(|v| !v.is_empty()));
    assert!(cookie(&resp, "refreshToken").is_some_and(|v| v != refresh));
    assert!(csrf_header(&resp).is_some());
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_catalog_pages_render() {
    let client = client();
    let base = base_url();

    for path in ["/", "/products", "/cart", "/login"] {
        let resp = client.get(format!("{base}{path}")).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK, "{path}");
        let html = resp.text().await.unwrap();
        assert!(html.contains("<html"), "{path}");
    }

    let resp = client
        .get(format!("{base}/products/definitely-not-a-product"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
