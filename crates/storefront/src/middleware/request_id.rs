//! Request correlation ids.
//!
//! An inbound `x-request-id` from the proxy in front of us is kept; otherwise
//! a UUID v4 is minted. The id lands in the tracing span, as a Sentry tag, and
//! back on the response.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest inbound id we are willing to echo.
const MAX_INBOUND_LEN: usize = 128;

fn inbound_id(request: &Request) -> Option<String> {
    request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_INBOUND_LEN)
        .map(String::from)
}

/// Tag the request with an id and echo it in the response.
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = inbound_id(&request).unwrap_or_else(|| Uuid::new_v4().to_string());

    Span::current().record("request_id", request_id.as_str());
    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;

    use super::*;

    #[test]
    fn test_inbound_id_is_trimmed_and_bounded() {
        let request = Request::builder()
            .header(REQUEST_ID_HEADER, " abc-123 ")
            .body(Body::empty())
            .unwrap();
        assert_eq!(inbound_id(&request).as_deref(), Some("abc-123"));

        let long = "x".repeat(MAX_INBOUND_LEN + 1);
        let request = Request::builder()
            .header(REQUEST_ID_HEADER, long)
            .body(Body::empty())
            .unwrap();
        assert_eq!(inbound_id(&request), None);
    }
}
