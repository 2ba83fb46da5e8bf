//! Product management route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use shopfront_core::ProductId;

use super::{checked, optional, required};
use crate::db::{ProductRepository, RepositoryError};
use crate::error::{AppError, PageResult, sentence};
use crate::middleware::RequireAdmin;
use crate::models::catalog::PRODUCTS_PER_PAGE;
use crate::models::{Product, ProductInput, ProductListing};
use crate::routes::products::total_pages;
use crate::state::AppState;
use crate::views::{FlashKind, PageContext, set_flash};

/// Product form as submitted: every field is text until validated.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductForm {
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: String,
    pub price: String,
    #[serde(default)]
    pub compare_at_price: String,
    #[serde(default)]
    pub stock: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image_url: String,
    pub active: Option<String>,
}

impl ProductForm {
    /// Parse and normalize into a repository input.
    ///
    /// # Errors
    ///
    /// Returns a user-facing message for the first invalid field.
    pub fn to_input(&self) -> Result<ProductInput, String> {
        ProductInput {
            name: self.name.clone(),
            slug: self.slug.clone(),
            description: self.description.trim().to_string(),
            price: required(&self.price, "price")?,
            compare_at_price: optional(&self.compare_at_price, "compare-at price")?,
            stock: optional(&self.stock, "stock")?.unwrap_or(0),
            category: self.category.clone(),
            image_url: Some(self.image_url.clone()),
            active: checked(self.active.as_deref()),
        }
        .normalized()
    }
}

impl From<&Product> for ProductForm {
    fn from(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            slug: product.slug.clone(),
            description: product.description.clone(),
            price: product.price.to_string(),
            compare_at_price: product
                .compare_at_price
                .map(|p| p.to_string())
                .unwrap_or_default(),
            stock: product.stock.to_string(),
            category: product.category.clone(),
            image_url: product.image_url.clone().unwrap_or_default(),
            active: product.active.then(|| "on".to_string()),
        }
    }
}

/// Product list template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/products/index.html")]
pub struct ProductsIndexTemplate {
    pub ctx: PageContext,
    pub products: Vec<Product>,
    pub q: String,
    pub current_page: u32,
    pub total_pages: u32,
    pub total: i64,
}

/// New/edit product form template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/products/form.html")]
pub struct ProductFormTemplate {
    pub ctx: PageContext,
    pub title: String,
    pub action: String,
    pub form: ProductForm,
    pub error: Option<String>,
}

impl ProductFormTemplate {
    #[must_use]
    pub fn is_active(&self) -> bool {
        checked(self.form.active.as_deref())
    }
}

/// Product list, including inactive products.
#[instrument(skip(state, ctx, _admin))]
pub async fn index(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAdmin(_admin): RequireAdmin,
    Query(listing): Query<ProductListing>,
) -> PageResult<ProductsIndexTemplate> {
    let page = ProductRepository::new(state.pool())
        .search(&listing, true)
        .await?;

    Ok(ProductsIndexTemplate {
        ctx,
        total_pages: total_pages(page.total, PRODUCTS_PER_PAGE),
        total: page.total,
        products: page.products,
        q: listing.search().unwrap_or_default().to_string(),
        current_page: listing.page(),
    })
}

/// New product form.
pub async fn new_product(ctx: PageContext, RequireAdmin(_admin): RequireAdmin) -> ProductFormTemplate {
    ProductFormTemplate {
        ctx,
        title: "New product".to_string(),
        action: "/admin/products".to_string(),
        form: ProductForm {
            active: Some("on".to_string()),
            stock: "0".to_string(),
            ..ProductForm::default()
        },
        error: None,
    }
}

fn rejected(ctx: PageContext, title: &str, action: String, form: ProductForm, error: String) -> Response {
    let status = StatusCode::UNPROCESSABLE_ENTITY;
    let page = ProductFormTemplate {
        ctx,
        title: title.to_string(),
        action,
        form,
        error: Some(sentence(&error)),
    };
    (status, page).into_response()
}

/// Create a product.
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
    RequireAdmin(admin): RequireAdmin,
    Form(form): Form<ProductForm>,
) -> PageResult<Response> {
    let action = "/admin/products".to_string();
    let input = match form.to_input() {
        Ok(input) => input,
        Err(error) => return Ok(rejected(ctx, "New product", action, form, error)),
    };

    match ProductRepository::new(state.pool()).create(&input).await {
        Ok(product) => {
            tracing::info!(product_id = %product.id, slug = %product.slug, admin_id = %admin.id, "Product created");
            set_flash(&session, FlashKind::Success, format!("Created {}", product.name)).await;
            Ok(Redirect::to("/admin/products").into_response())
        }
        Err(RepositoryError::Conflict(error)) => Ok(rejected(ctx, "New product", action, form, error)),
        Err(err) => Err(err.into()),
    }
}

/// Edit product form.
#[instrument(skip(state, ctx, _admin))]
pub async fn edit(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> PageResult<ProductFormTemplate> {
    let product = ProductRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    Ok(ProductFormTemplate {
        ctx,
        title: format!("Edit {}", product.name),
        action: format!("/admin/products/{}", product.id),
        form: ProductForm::from(&product),
        error: None,
    })
}

/// Update a product.
#[instrument(skip(state, session, ctx, admin, form))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Form(form): Form<ProductForm>,
) -> PageResult<Response> {
    let action = format!("/admin/products/{id}");
    let title = "Edit product";
    let input = match form.to_input() {
        Ok(input) => input,
        Err(error) => return Ok(rejected(ctx, title, action, form, error)),
    };

    match ProductRepository::new(state.pool()).update(id, &input).await {
        Ok(product) => {
            tracing::info!(product_id = %product.id, admin_id = %admin.id, "Product updated");
            set_flash(&session, FlashKind::Success, format!("Saved {}", product.name)).await;
            Ok(Redirect::to("/admin/products").into_response())
        }
        Err(RepositoryError::Conflict(error)) => Ok(rejected(ctx, title, action, form, error)),
        Err(err) => Err(err.into()),
    }
}

/// Delete a product.
#[instrument(skip(state, session, admin))]
pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> PageResult<Redirect> {
    ProductRepository::new(state.pool()).delete(id).await?;
    tracing::info!(product_id = %id, admin_id = %admin.id, "Product deleted");
    set_flash(&session, FlashKind::Success, "Product deleted").await;
    Ok(Redirect::to("/admin/products"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn form() -> ProductForm {
        ProductForm {
            name: "Blue Mug".to_string(),
            price: "12.50".to_string(),
            active: Some("on".to_string()),
            ..ProductForm::default()
        }
    }

    #[test]
    fn test_blank_fields_get_defaults() {
        let input = form().to_input().unwrap();
        assert_eq!(input.slug, "blue-mug");
        assert_eq!(input.price, Decimal::new(1250, 2));
        assert_eq!(input.stock, 0);
        assert_eq!(input.compare_at_price, None);
        assert_eq!(input.image_url, None);
        assert!(input.active);
    }

    #[test]
    fn test_unticked_checkbox_deactivates() {
        let input = ProductForm { active: None, ..form() }.to_input().unwrap();
        assert!(!input.active);
    }

    #[test]
    fn test_bad_price_is_reported() {
        let err = ProductForm { price: "cheap".to_string(), ..form() }
            .to_input()
            .unwrap_err();
        assert_eq!(err, "price is not valid");
    }
}
