//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::Redirect,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::db::{ProductRepository, ReviewRepository};
use crate::error::{AppError, PageResult};
use crate::middleware::{OptionalUser, RequireUser};
use crate::models::catalog::PRODUCTS_PER_PAGE;
use crate::models::{Product, ProductListing, ProductSort, Review, ReviewSummary};
use crate::services::reviews;
use crate::state::AppState;
use crate::views::{FlashKind, PageContext, set_flash};

/// Reviews shown on a product page.
const REVIEWS_PER_PAGE: i64 = 20;

/// Review form data.
#[derive(Debug, Deserialize)]
pub struct ReviewForm {
    pub rating: i64,
    #[serde(default)]
    pub comment: String,
}

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub ctx: PageContext,
    pub products: Vec<Product>,
    pub categories: Vec<String>,
    pub q: String,
    pub category: String,
    pub sort: ProductSort,
    pub sorts: [ProductSort; 3],
    pub current_page: u32,
    pub total_pages: u32,
    pub total: i64,
}

impl ProductsIndexTemplate {
    /// Query string for another page of the same listing.
    #[must_use]
    pub fn page_query(&self, page: u32) -> String {
        format!(
            "?q={}&category={}&sort={}&page={page}",
            urlencoding::encode(&self.q),
            urlencoding::encode(&self.category),
            self.sort.as_str()
        )
    }
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub ctx: PageContext,
    pub product: Product,
    pub reviews: Vec<Review>,
    pub summary: ReviewSummary,
    pub has_reviewed: bool,
}

/// Number of pages needed for `total` items.
#[must_use]
pub fn total_pages(total: i64, per_page: u32) -> u32 {
    let per_page = i64::from(per_page.max(1));
    u32::try_from((total + per_page - 1) / per_page)
        .unwrap_or(u32::MAX)
        .max(1)
}

/// Display the product listing: search, category filter, sort, pages.
#[instrument(skip(state, ctx))]
pub async fn index(
    State(state): State<AppState>,
    ctx: PageContext,
    Query(listing): Query<ProductListing>,
) -> PageResult<ProductsIndexTemplate> {
    let repo = ProductRepository::new(state.pool());
    let page = repo.search(&listing, false).await?;
    let categories = repo.categories().await?;

    Ok(ProductsIndexTemplate {
        ctx,
        total_pages: total_pages(page.total, PRODUCTS_PER_PAGE),
        total: page.total,
        products: page.products,
        categories,
        q: listing.search().unwrap_or_default().to_string(),
        category: listing.category_filter().unwrap_or_default().to_string(),
        sort: listing.sort_order(),
        sorts: ProductSort::ALL,
        current_page: listing.page(),
    })
}

/// Load an active product by slug, or 404.
pub(crate) async fn active_product(state: &AppState, slug: &str) -> Result<Product, AppError> {
    ProductRepository::new(state.pool())
        .get_by_slug(slug)
        .await?
        .filter(|p| p.active)
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
}

/// Display a product with its reviews.
#[instrument(skip(state, ctx, user))]
pub async fn show(
    State(state): State<AppState>,
    ctx: PageContext,
    OptionalUser(user): OptionalUser,
    Path(slug): Path<String>,
) -> PageResult<ProductShowTemplate> {
    let product = active_product(&state, &slug).await?;
    let repo = ReviewRepository::new(state.pool());
    let reviews = repo.for_product(product.id, REVIEWS_PER_PAGE).await?;
    let summary = repo.summary(product.id).await?;
    let has_reviewed = user
        .as_ref()
        .is_some_and(|u| reviews.iter().any(|r| r.user_id == u.id));

    Ok(ProductShowTemplate {
        ctx,
        product,
        reviews,
        summary,
        has_reviewed,
    })
}

/// Handle the review form on a product page.
#[instrument(skip(state, session, user, form))]
pub async fn create_review(
    State(state): State<AppState>,
    session: Session,
    RequireUser(user): RequireUser,
    Path(slug): Path<String>,
    Form(form): Form<ReviewForm>,
) -> PageResult<Redirect> {
    let product = active_product(&state, &slug).await?;
    let back = format!("/products/{}#reviews", product.slug);

    match reviews::submit(state.pool(), product.id, user.id, form.rating, &form.comment).await {
        Ok(_) => set_flash(&session, FlashKind::Success, "Thanks for your review!").await,
        Err(err) => {
            let err = AppError::from(err);
            if err.status().is_server_error() {
                return Err(err.into());
            }
            set_flash(&session, FlashKind::Error, err.public_message()).await;
        }
    }
    Ok(Redirect::to(&back))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 12), 1);
        assert_eq!(total_pages(12, 12), 1);
        assert_eq!(total_pages(13, 12), 2);
        assert_eq!(total_pages(25, 12), 3);
    }

    #[test]
    fn test_listing_links_keep_filters() {
        let now = chrono::Utc::now();
        let mug = Product {
            id: shopfront_core::ProductId::new(3),
            slug: "blue-mug".to_string(),
            name: "Blue Mug".to_string(),
            description: String::new(),
            price: rust_decimal::Decimal::new(1450, 2),
            compare_at_price: None,
            stock: 4,
            category: "kitchen".to_string(),
            image_url: None,
            active: true,
            created_at: now,
            updated_at: now,
        };
        let page = ProductsIndexTemplate {
            ctx: PageContext::default(),
            products: vec![mug],
            categories: vec!["kitchen".to_string()],
            q: "mug tea".to_string(),
            category: "kitchen".to_string(),
            sort: ProductSort::PriceAsc,
            sorts: ProductSort::ALL,
            current_page: 2,
            total_pages: 3,
            total: 30,
        };

        let html = page.render().unwrap();

        let back = html
            .split(r#"name="back" value=""#)
            .nth(1)
            .and_then(|rest| rest.split('"').next())
            .unwrap();
        assert!(back.starts_with("/products?q=mug%20tea"));
        assert!(back.contains("category=kitchen"));
        assert!(back.contains("sort=price_asc"));
        assert!(back.ends_with("page=2"));
        assert!(html.contains("page=1"));
        assert!(html.contains("page=3"));
    }
}
