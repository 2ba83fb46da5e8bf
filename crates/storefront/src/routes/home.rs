//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tracing::instrument;

use crate::db::ProductRepository;
use crate::error::PageResult;
use crate::models::Product;
use crate::state::AppState;
use crate::views::PageContext;

/// Products shown on the home page.
const FEATURED_LIMIT: i64 = 8;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub ctx: PageContext,
    pub featured: Vec<Product>,
    pub categories: Vec<String>,
}

/// Display the home page: newest products and category links.
#[instrument(skip(state, ctx))]
pub async fn home(State(state): State<AppState>, ctx: PageContext) -> PageResult<HomeTemplate> {
    let products = ProductRepository::new(state.pool());
    let featured = products.featured(FEATURED_LIMIT).await?;
    let categories = products.categories().await?;

    Ok(HomeTemplate {
        ctx,
        featured,
        categories,
    })
}
