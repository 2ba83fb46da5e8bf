//! Catalog API.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use shopfront_core::ReviewId;

use crate::db::{ProductRepository, ReviewRepository};
use crate::error::Result;
use crate::middleware::RequireUser;
use crate::models::catalog::PRODUCTS_PER_PAGE;
use crate::models::{Product, ProductListing, Review, ReviewSummary};
use crate::routes::products::{active_product, total_pages};
use crate::services::reviews;
use crate::state::AppState;

/// Reviews returned with a product.
const REVIEW_LIMIT: i64 = 50;

/// One page of products.
#[derive(Debug, Serialize)]
pub struct ProductList {
    pub products: Vec<Product>,
    pub total: i64,
    pub page: u32,
    pub total_pages: u32,
}

/// A product's reviews and rating summary.
#[derive(Debug, Serialize)]
pub struct ProductReviews {
    pub summary: ReviewSummary,
    pub reviews: Vec<Review>,
}

/// New review request body.
#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub rating: i64,
    #[serde(default)]
    pub comment: String,
}

/// Id of a created review.
#[derive(Debug, Serialize)]
pub struct ReviewCreated {
    pub id: ReviewId,
}

/// GET /api/products
///
/// # Errors
///
/// Returns 500/503 if the catalog can't be read.
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Query(listing): Query<ProductListing>,
) -> Result<Json<ProductList>> {
    let page = ProductRepository::new(state.pool())
        .search(&listing, false)
        .await?;
    Ok(Json(ProductList {
        total_pages: total_pages(page.total, PRODUCTS_PER_PAGE),
        total: page.total,
        products: page.products,
        page: listing.page(),
    }))
}

/// GET /api/products/{slug}
///
/// # Errors
///
/// Returns 404 for unknown or inactive products.
#[instrument(skip(state))]
pub async fn show(State(state): State<AppState>, Path(slug): Path<String>) -> Result<Json<Product>> {
    Ok(Json(active_product(&state, &slug).await?))
}

/// GET /api/products/{slug}/reviews
///
/// # Errors
///
/// Returns 404 for unknown or inactive products.
#[instrument(skip(state))]
pub async fn reviews(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ProductReviews>> {
    let product = active_product(&state, &slug).await?;
    let repo = ReviewRepository::new(state.pool());
    Ok(Json(ProductReviews {
        summary: repo.summary(product.id).await?,
        reviews: repo.for_product(product.id, REVIEW_LIMIT).await?,
    }))
}

/// POST /api/products/{slug}/reviews
///
/// # Errors
///
/// Returns 400 for a bad rating or comment and 409 if the user already
/// reviewed this product.
#[instrument(skip(state, user, body))]
pub async fn create_review(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(slug): Path<String>,
    Json(body): Json<ReviewRequest>,
) -> Result<(StatusCode, Json<ReviewCreated>)> {
    let product = active_product(&state, &slug).await?;
    let id = reviews::submit(state.pool(), product.id, user.id, body.rating, &body.comment).await?;
    Ok((StatusCode::CREATED, Json(ReviewCreated { id })))
}
