//! Request shield and health probes.

#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};

use shopfront_integration_tests::{browser_request, json_body, send, test_app};

#[tokio::test]
async fn test_missing_user_agent_is_denied() {
    let (app, _) = test_app();
    let request = Request::builder()
        .uri("/api/cart")
        .header("x-forwarded-for", "203.0.113.7")
        .body(Body::empty())
        .unwrap();

    let response = send(app, request).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_scripted_client_is_denied() {
    let (app, _) = test_app();
    let request = Request::builder()
        .uri("/products")
        .header(header::USER_AGENT, "curl/8.5.0")
        .header("x-forwarded-for", "203.0.113.7")
        .body(Body::empty())
        .unwrap();

    let response = send(app, request).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_search_engine_may_read_but_not_write() {
    let (app, _) = test_app();
    let googlebot = "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

    let read = Request::builder()
        .uri("/api/cart")
        .header(header::USER_AGENT, googlebot)
        .header("x-forwarded-for", "66.249.66.1")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(app.clone(), read).await.status(), StatusCode::OK);

    let write = Request::builder()
        .method(Method::POST)
        .uri("/cart/add")
        .header(header::USER_AGENT, googlebot)
        .header("x-forwarded-for", "66.249.66.1")
        .body(Body::from("product_id=1"))
        .unwrap();
    assert_eq!(send(app, write).await.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_health_is_not_screened() {
    let (app, _) = test_app();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let response = send(app, request).await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_readiness_reports_unreachable_database() {
    let (app, _) = test_app();
    let request = Request::builder()
        .uri("/health/ready")
        .body(Body::empty())
        .unwrap();

    let response = send(app, request).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_responses_carry_security_headers_and_request_id() {
    let (app, _) = test_app();
    let request = browser_request(Method::GET, "/api/auth/session")
        .header("x-request-id", "req-123")
        .body(Body::empty())
        .unwrap();

    let response = send(app, request).await;

    let headers = response.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-request-id").unwrap(), "req-123");
    assert!(headers.get("content-security-policy").is_some());
}
