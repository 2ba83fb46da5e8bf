//! Route protection and access-token handling at the edge.
//!
//! These run the real router without a database: every request here is
//! decided by the session guard before a handler would need one.

use axum::body::Body;
use axum::http::{Method, StatusCode, header};
use chrono::{Duration, Utc};
use serde_json::json;

use shopfront_core::Role;
use shopfront_integration_tests::{
    access_cookie, browser_request, json_body, location, send, set_cookies, test_app,
    test_user, tokens_at,
};

// ============================================================================
// Anonymous visitors
// ============================================================================

#[tokio::test]
async fn test_anonymous_account_page_redirects_to_login() {
    let (app, _) = test_app();
    let request = browser_request(Method::GET, "/account")
        .body(Body::empty())
        .unwrap();

    let response = send(app, request).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login?next=%2Faccount"));
}

#[tokio::test]
async fn test_login_redirect_keeps_the_query_string() {
    let (app, _) = test_app();
    let request = browser_request(Method::GET, "/admin/orders?status=paid")
        .body(Body::empty())
        .unwrap();

    let response = send(app, request).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        Some("/login?next=%2Fadmin%2Forders%3Fstatus%3Dpaid")
    );
}

#[tokio::test]
async fn test_anonymous_api_call_gets_401_json() {
    let (app, _) = test_app();
    let request = browser_request(Method::GET, "/api/orders")
        .header(header::ACCEPT, "application/json")
        .body(Body::empty())
        .unwrap();

    let response = send(app, request).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body, json!({ "error": "Authentication required" }));
}

#[tokio::test]
async fn test_anonymous_session_state_sets_no_cookies() {
    let (app, _) = test_app();
    let request = browser_request(Method::GET, "/api/auth/session")
        .body(Body::empty())
        .unwrap();

    let response = send(app, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookies(&response).is_empty());
    let body = json_body(response).await;
    assert_eq!(body["authenticated"], false);
    assert!(body["user"].is_null());
    assert_eq!(body["refresh_threshold"], 300);
}

#[tokio::test]
async fn test_public_cart_works_without_a_session() {
    let (app, _) = test_app();
    let request = browser_request(Method::GET, "/api/cart")
        .body(Body::empty())
        .unwrap();

    let response = send(app, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["item_count"], 0);
    assert!(body["lines"].as_array().is_some_and(Vec::is_empty));
}

// ============================================================================
// Signed-in users
// ============================================================================

#[tokio::test]
async fn test_valid_access_token_authenticates() {
    let (app, state) = test_app();
    let user = test_user(7, Role::Customer);
    let pair = tokens_at(&state, &user, Utc::now());
    let request = browser_request(Method::GET, "/api/auth/session")
        .header(header::COOKIE, access_cookie(&pair))
        .body(Body::empty())
        .unwrap();

    let response = send(app, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookies(&response).is_empty());
    let body = json_body(response).await;
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["user"]["id"], 7);
    assert_eq!(body["user"]["role"], "customer");
    assert_eq!(body["csrf_token"], pair.csrf_token.as_str());
    assert_eq!(body["expires_at"], pair.access_expires_at.timestamp());
}

#[tokio::test]
async fn test_expiring_token_without_refresh_cookie_is_still_honored() {
    let (app, state) = test_app();
    let user = test_user(7, Role::Customer);
    // 900s lifetime issued 700s ago: inside the 300s refresh window.
    let pair = tokens_at(&state, &user, Utc::now() - Duration::seconds(700));
    let request = browser_request(Method::GET, "/api/auth/session")
        .header(header::COOKIE, access_cookie(&pair))
        .body(Body::empty())
        .unwrap();

    let response = send(app, request).await;

    assert!(set_cookies(&response).is_empty());
    let body = json_body(response).await;
    assert_eq!(body["authenticated"], true);
}

#[tokio::test]
async fn test_expired_token_without_refresh_cookie_is_cleared() {
    let (app, state) = test_app();
    let user = test_user(7, Role::Customer);
    let pair = tokens_at(&state, &user, Utc::now() - Duration::hours(2));
    let request = browser_request(Method::GET, "/api/auth/session")
        .header(header::COOKIE, access_cookie(&pair))
        .body(Body::empty())
        .unwrap();

    let response = send(app, request).await;

    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 2);
    assert!(cookies.iter().any(|c| c.starts_with("accessToken=;")));
    assert!(cookies.iter().any(|c| c.starts_with("refreshToken=;")));
    assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));
    let body = json_body(response).await;
    assert_eq!(body["authenticated"], false);
}

#[tokio::test]
async fn test_forged_token_is_treated_as_anonymous() {
    let (app, _) = test_app();
    let request = browser_request(Method::GET, "/account")
        .header(header::COOKIE, "accessToken=eyJhbGciOiJIUzI1NiJ9.e30.forged")
        .body(Body::empty())
        .unwrap();

    let response = send(app, request).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login?next=%2Faccount"));
    assert_eq!(set_cookies(&response).len(), 2);
}

#[tokio::test]
async fn test_expired_token_with_forged_refresh_goes_to_login_and_clears() {
    let (app, state) = test_app();
    let pair = tokens_at(&state, &test_user(7, Role::Customer), Utc::now() - Duration::hours(2));
    let request = browser_request(Method::GET, "/account?tab=1")
        .header(
            header::COOKIE,
            format!("{}; refreshToken=eyJhbGciOiJIUzI1NiJ9.e30.forged", access_cookie(&pair)),
        )
        .body(Body::empty())
        .unwrap();

    let response = send(app, request).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login?next=%2Faccount%3Ftab%3D1"));
    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 2);
    assert!(cookies.iter().any(|c| c.starts_with("accessToken=;")));
    assert!(cookies.iter().any(|c| c.starts_with("refreshToken=;")));
    assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));
}

#[tokio::test]
async fn test_refresh_during_database_outage_keeps_cookies() {
    let (app, state) = test_app();
    let pair = tokens_at(&state, &test_user(7, Role::Customer), Utc::now() - Duration::hours(2));
    let request = browser_request(Method::GET, "/account")
        .header(
            header::COOKIE,
            format!("{}; refreshToken={}", access_cookie(&pair), pair.refresh_token),
        )
        .body(Body::empty())
        .unwrap();

    let response = send(app, request).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login?next=%2Faccount"));
    assert!(set_cookies(&response).is_empty());
}

#[tokio::test]
async fn test_signed_in_users_are_sent_home_from_guest_pages() {
    let (app, state) = test_app();
    let customer = tokens_at(&state, &test_user(7, Role::Customer), Utc::now());
    let admin = tokens_at(&state, &test_user(1, Role::Admin), Utc::now());

    let response = send(
        app.clone(),
        browser_request(Method::GET, "/login")
            .header(header::COOKIE, access_cookie(&customer))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/"));

    let response = send(
        app,
        browser_request(Method::GET, "/register")
            .header(header::COOKIE, access_cookie(&admin))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/admin"));
}

#[tokio::test]
async fn test_signed_in_users_follow_next_from_guest_pages() {
    let (app, state) = test_app();
    let customer = tokens_at(&state, &test_user(7, Role::Customer), Utc::now());

    let response = send(
        app.clone(),
        browser_request(Method::GET, "/login?next=%2Faccount%3Ftab%3D1")
            .header(header::COOKIE, access_cookie(&customer))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/account?tab=1"));

    let response = send(
        app,
        browser_request(Method::GET, "/login?next=%2F%2Fevil.example")
            .header(header::COOKIE, access_cookie(&customer))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(location(&response), Some("/"));
}

// ============================================================================
// Admin area
// ============================================================================

#[tokio::test]
async fn test_customer_is_redirected_away_from_admin_pages() {
    let (app, state) = test_app();
    let pair = tokens_at(&state, &test_user(7, Role::Customer), Utc::now());
    let request = browser_request(Method::GET, "/admin/products")
        .header(header::COOKIE, access_cookie(&pair))
        .body(Body::empty())
        .unwrap();

    let response = send(app, request).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/"));
}

#[tokio::test]
async fn test_customer_gets_403_from_admin_api() {
    let (app, state) = test_app();
    let pair = tokens_at(&state, &test_user(7, Role::Customer), Utc::now());
    let request = browser_request(Method::GET, "/api/admin/stats")
        .header(header::COOKIE, access_cookie(&pair))
        .body(Body::empty())
        .unwrap();

    let response = send(app, request).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Admin access required");
}

// ============================================================================
// Refresh endpoint
// ============================================================================

#[tokio::test]
async fn test_refresh_without_cookie_is_401() {
    let (app, _) = test_app();
    let request = browser_request(Method::POST, "/api/auth/refresh")
        .body(Body::empty())
        .unwrap();

    let response = send(app, request).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"], "No session to refresh");
}
