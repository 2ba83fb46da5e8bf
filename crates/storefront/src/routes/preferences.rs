//! Display preferences.

use axum::{
    Form,
    extract::State,
    http::{HeaderMap, header},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use url::Url;

use crate::error::AppError;
use crate::middleware::cookies;
use crate::state::AppState;
use crate::views::Theme;

/// Theme form data.
#[derive(Debug, Deserialize)]
pub struct ThemeForm {
    pub theme: String,
}

/// The page the request came from, if it was one of ours.
fn referring_path(headers: &HeaderMap, origin: &str) -> Option<String> {
    let referer = headers.get(header::REFERER)?.to_str().ok()?;
    let url = Url::parse(referer).ok()?;
    if url.origin().ascii_serialization() != origin.trim_end_matches('/') {
        return None;
    }
    let mut path = url.path().to_string();
    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }
    Some(path)
}

/// Store the theme preference and go back to the page it was set from.
pub async fn set_theme(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<ThemeForm>,
) -> Result<Response, AppError> {
    let theme: Theme = form
        .theme
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Unknown theme: {}", form.theme)))?;

    let back = referring_path(&headers, &state.config().origin()).unwrap_or_else(|| "/".to_string());
    let mut response = Redirect::to(&back).into_response();
    cookies::append(
        response.headers_mut(),
        [cookies::theme_cookie(theme.as_str(), state.config().secure_cookies())],
    );
    Ok(response)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn with_referer(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::REFERER, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_same_origin_referer_keeps_path_and_query() {
        let headers = with_referer("https://shop.example/products?q=mug&page=2");
        assert_eq!(
            referring_path(&headers, "https://shop.example").as_deref(),
            Some("/products?q=mug&page=2")
        );
    }

    #[test]
    fn test_foreign_referer_is_ignored() {
        let headers = with_referer("https://evil.example/products");
        assert_eq!(referring_path(&headers, "https://shop.example"), None);
        assert_eq!(referring_path(&HeaderMap::new(), "https://shop.example"), None);
    }
}
