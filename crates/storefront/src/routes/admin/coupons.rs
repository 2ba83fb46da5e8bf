//! Coupon management route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use shopfront_core::{CouponId, DiscountKind};

use super::{checked, optional, required};
use crate::db::{CouponRepository, RepositoryError};
use crate::error::{AppError, PageResult, sentence};
use crate::middleware::RequireAdmin;
use crate::models::{Coupon, CouponInput};
use crate::state::AppState;
use crate::views::{FlashKind, PageContext, set_flash};

/// `datetime-local` inputs submit minutes without a zone; they are read as UTC.
const DATETIME_LOCAL: &str = "%Y-%m-%dT%H:%M";

/// Coupon form as submitted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CouponForm {
    pub code: String,
    pub kind: String,
    pub value: String,
    #[serde(default)]
    pub min_subtotal: String,
    #[serde(default)]
    pub max_uses: String,
    #[serde(default)]
    pub expires_at: String,
    pub active: Option<String>,
}

/// Parse an expiry field: blank, `datetime-local`, a bare date (end of that
/// day), or RFC 3339.
///
/// # Errors
///
/// Returns a user-facing message if the value is not a recognised date.
pub fn parse_expiry(value: &str) -> Result<Option<DateTime<Utc>>, String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    if let Ok(at) = NaiveDateTime::parse_from_str(value, DATETIME_LOCAL) {
        return Ok(Some(at.and_utc()));
    }
    if let Some(end_of_day) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(23, 59, 59))
    {
        return Ok(Some(end_of_day.and_utc()));
    }
    DateTime::parse_from_rfc3339(value)
        .map(|at| Some(at.with_timezone(&Utc)))
        .map_err(|_| "expiry date is not valid".to_string())
}

impl CouponForm {
    /// Parse and normalize into a repository input.
    ///
    /// # Errors
    ///
    /// Returns a user-facing message for the first invalid field.
    pub fn to_input(&self) -> Result<CouponInput, String> {
        CouponInput {
            code: self.code.clone(),
            kind: required::<DiscountKind>(&self.kind, "discount type")?,
            value: required(&self.value, "value")?,
            min_subtotal: optional(&self.min_subtotal, "minimum subtotal")?,
            max_uses: optional(&self.max_uses, "usage limit")?,
            expires_at: parse_expiry(&self.expires_at)?,
            active: checked(self.active.as_deref()),
        }
        .normalized()
    }
}

impl From<&Coupon> for CouponForm {
    fn from(coupon: &Coupon) -> Self {
        Self {
            code: coupon.code.clone(),
            kind: coupon.kind.to_string(),
            value: coupon.value.normalize().to_string(),
            min_subtotal: coupon.min_subtotal.normalize().to_string(),
            max_uses: coupon.max_uses.map(|m| m.to_string()).unwrap_or_default(),
            expires_at: coupon
                .expires_at
                .map(|at| at.format(DATETIME_LOCAL).to_string())
                .unwrap_or_default(),
            active: coupon.active.then(|| "on".to_string()),
        }
    }
}

/// Coupon list template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/coupons/index.html")]
pub struct CouponsIndexTemplate {
    pub ctx: PageContext,
    pub coupons: Vec<Coupon>,
}

/// New/edit coupon form template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/coupons/form.html")]
pub struct CouponFormTemplate {
    pub ctx: PageContext,
    pub title: String,
    pub action: String,
    pub form: CouponForm,
    pub error: Option<String>,
}

impl CouponFormTemplate {
    #[must_use]
    pub fn is_active(&self) -> bool {
        checked(self.form.active.as_deref())
    }

    #[must_use]
    pub fn is_kind(&self, kind: &str) -> bool {
        self.form.kind == kind
    }
}

fn rejected(ctx: PageContext, title: &str, action: String, form: CouponForm, error: String) -> Response {
    let page = CouponFormTemplate {
        ctx,
        title: title.to_string(),
        action,
        form,
        error: Some(sentence(&error)),
    };
    (StatusCode::UNPROCESSABLE_ENTITY, page).into_response()
}

/// Coupon list.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAdmin(_admin): RequireAdmin,
) -> PageResult<CouponsIndexTemplate> {
    let coupons = CouponRepository::new(state.pool()).list().await?;
    Ok(CouponsIndexTemplate { ctx, coupons })
}

/// New coupon form.
pub async fn new_coupon(ctx: PageContext, RequireAdmin(_admin): RequireAdmin) -> CouponFormTemplate {
    CouponFormTemplate {
        ctx,
        title: "New coupon".to_string(),
        action: "/admin/coupons".to_string(),
        form: CouponForm {
            kind: DiscountKind::Percentage.to_string(),
            active: Some("on".to_string()),
            ..CouponForm::default()
        },
        error: None,
    }
}

/// Create a coupon.
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
    RequireAdmin(admin): RequireAdmin,
    Form(form): Form<CouponForm>,
) -> PageResult<Response> {
    let action = "/admin/coupons".to_string();
    let input = match form.to_input() {
        Ok(input) => input,
        Err(error) => return Ok(rejected(ctx, "New coupon", action, form, error)),
    };

    match CouponRepository::new(state.pool()).create(&input).await {
        Ok(coupon) => {
            tracing::info!(coupon_id = %coupon.id, code = %coupon.code, admin_id = %admin.id, "Coupon created");
            set_flash(&session, FlashKind::Success, format!("Created coupon {}", coupon.code)).await;
            Ok(Redirect::to("/admin/coupons").into_response())
        }
        Err(RepositoryError::Conflict(error)) => Ok(rejected(ctx, "New coupon", action, form, error)),
        Err(err) => Err(err.into()),
    }
}

/// Edit coupon form.
#[instrument(skip(state, ctx, _admin))]
pub async fn edit(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<CouponId>,
) -> PageResult<CouponFormTemplate> {
    let coupon = CouponRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Coupon not found".to_string()))?;

    Ok(CouponFormTemplate {
        ctx,
        title: format!("Edit {}", coupon.code),
        action: format!("/admin/coupons/{}", coupon.id),
        form: CouponForm::from(&coupon),
        error: None,
    })
}

/// Update a coupon.
#[instrument(skip(state, session, ctx, admin, form))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CouponId>,
    Form(form): Form<CouponForm>,
) -> PageResult<Response> {
    let action = format!("/admin/coupons/{id}");
    let title = "Edit coupon";
    let input = match form.to_input() {
        Ok(input) => input,
        Err(error) => return Ok(rejected(ctx, title, action, form, error)),
    };

    match CouponRepository::new(state.pool()).update(id, &input).await {
        Ok(coupon) => {
            tracing::info!(coupon_id = %coupon.id, admin_id = %admin.id, "Coupon updated");
            set_flash(&session, FlashKind::Success, format!("Saved coupon {}", coupon.code)).await;
            Ok(Redirect::to("/admin/coupons").into_response())
        }
        Err(RepositoryError::Conflict(error)) => Ok(rejected(ctx, title, action, form, error)),
        Err(err) => Err(err.into()),
    }
}

/// Delete a coupon.
#[instrument(skip(state, session, admin))]
pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CouponId>,
) -> PageResult<Redirect> {
    CouponRepository::new(state.pool()).delete(id).await?;
    tracing::info!(coupon_id = %id, admin_id = %admin.id, "Coupon deleted");
    set_flash(&session, FlashKind::Success, "Coupon deleted").await;
    Ok(Redirect::to("/admin/coupons"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_expiry_formats() {
        assert_eq!(parse_expiry("").unwrap(), None);
        assert_eq!(
            parse_expiry("2026-12-31T18:30").unwrap(),
            Some(Utc.with_ymd_and_hms(2026, 12, 31, 18, 30, 0).unwrap())
        );
        assert_eq!(
            parse_expiry("2026-12-31").unwrap(),
            Some(Utc.with_ymd_and_hms(2026, 12, 31, 23, 59, 59).unwrap())
        );
        assert_eq!(
            parse_expiry("2026-12-31T18:30:00+02:00").unwrap(),
            Some(Utc.with_ymd_and_hms(2026, 12, 31, 16, 30, 0).unwrap())
        );
        assert!(parse_expiry("next tuesday").is_err());
    }

    #[test]
    fn test_form_to_input() {
        let form = CouponForm {
            code: " spring-10 ".to_string(),
            kind: "percentage".to_string(),
            value: "10".to_string(),
            max_uses: "100".to_string(),
            active: Some("on".to_string()),
            ..CouponForm::default()
        };
        let input = form.to_input().unwrap();
        assert_eq!(input.code, "SPRING-10");
        assert_eq!(input.kind, DiscountKind::Percentage);
        assert_eq!(input.value, Decimal::TEN);
        assert_eq!(input.min_subtotal, None);
        assert_eq!(input.max_uses, Some(100));
        assert!(input.active);
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let form = CouponForm {
            code: "X".to_string(),
            kind: "bogo".to_string(),
            value: "1".to_string(),
            ..CouponForm::default()
        };
        assert_eq!(form.to_input().unwrap_err(), "discount type is not valid");
    }
}
