//! User management route handlers.

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

use shopfront_core::{Role, UserId};

use super::{ADMIN_PAGE_SIZE, PageQuery};
use crate::db::UserRepository;
use crate::error::PageResult;
use crate::middleware::RequireAdmin;
use crate::models::User;
use crate::state::AppState;
use crate::views::{FlashKind, PageContext, set_flash};

/// Role change form data.
#[derive(Debug, Deserialize)]
pub struct RoleForm {
    pub role: String,
}

/// User list template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/users.html")]
pub struct UsersTemplate {
    pub ctx: PageContext,
    pub users: Vec<User>,
    pub current_page: u32,
    pub has_next: bool,
}

impl UsersTemplate {
    /// Whether this row is the signed-in admin, whose role can't be changed here.
    #[must_use]
    pub fn is_self(&self, user: &User) -> bool {
        self.ctx.user.as_ref().is_some_and(|me| me.id == user.id)
    }
}

/// User list, newest first.
#[instrument(skip(state, ctx, _admin))]
pub async fn index(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<PageQuery>,
) -> PageResult<UsersTemplate> {
    let users = UserRepository::new(state.pool())
        .list(i64::from(ADMIN_PAGE_SIZE), query.offset())
        .await?;

    Ok(UsersTemplate {
        ctx,
        has_next: users.len() == ADMIN_PAGE_SIZE as usize,
        users,
        current_page: query.page(),
    })
}

/// Change a user's role. Admins can't demote themselves.
#[instrument(skip(state, session, admin))]
pub async fn update_role(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<UserId>,
    Form(form): Form<RoleForm>,
) -> PageResult<Redirect> {
    let back = Redirect::to("/admin/users");
    if id == admin.id {
        set_flash(&session, FlashKind::Error, "You can't change your own role").await;
        return Ok(back);
    }
    let Ok(role) = form.role.parse::<Role>() else {
        set_flash(&session, FlashKind::Error, "Unknown role").await;
        return Ok(back);
    };

    let user = UserRepository::new(state.pool()).set_role(id, role).await?;
    tracing::info!(user_id = %user.id, role = %user.role, admin_id = %admin.id, "User role changed");
    set_flash(
        &session,
        FlashKind::Success,
        format!("{} is now {}", user.email.as_str(), user.role),
    )
    .await;
    Ok(back)
}
