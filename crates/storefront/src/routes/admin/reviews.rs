//! Review moderation route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::Redirect,
};
use tower_sessions::Session;
use tracing::instrument;

use shopfront_core::ReviewId;

use super::{ADMIN_PAGE_SIZE, PageQuery};
use crate::db::ReviewRepository;
use crate::db::reviews::ReviewWithProduct;
use crate::error::PageResult;
use crate::middleware::RequireAdmin;
use crate::state::AppState;
use crate::views::{FlashKind, PageContext, set_flash};

/// Review list template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/reviews.html")]
pub struct ReviewsTemplate {
    pub ctx: PageContext,
    pub reviews: Vec<ReviewWithProduct>,
    pub current_page: u32,
    pub has_next: bool,
}

/// Recent reviews across the catalog.
#[instrument(skip(state, ctx, _admin))]
pub async fn index(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<PageQuery>,
) -> PageResult<ReviewsTemplate> {
    let reviews = ReviewRepository::new(state.pool())
        .recent(i64::from(ADMIN_PAGE_SIZE), query.offset())
        .await?;

    Ok(ReviewsTemplate {
        ctx,
        has_next: reviews.len() == ADMIN_PAGE_SIZE as usize,
        reviews,
        current_page: query.page(),
    })
}

/// Remove a review.
#[instrument(skip(state, session, admin))]
pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ReviewId>,
) -> PageResult<Redirect> {
    ReviewRepository::new(state.pool()).delete(id).await?;
    tracing::info!(review_id = %id, admin_id = %admin.id, "Review removed");
    set_flash(&session, FlashKind::Success, "Review removed").await;
    Ok(Redirect::to("/admin/reviews"))
}
