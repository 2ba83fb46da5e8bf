//! Account route handlers.
//!
//! These routes require authentication; the session guard sends anonymous
//! visitors to the login page before they get here.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::Redirect,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use shopfront_core::{AddressId, OrderId};

use crate::db::{AddressRepository, OrderRepository, UserRepository};
use crate::error::{AppError, PageResult, sentence};
use crate::middleware::RequireUser;
use crate::models::{Address, AddressInput, Order, OrderItem, OrderSummary, User};
use crate::services::auth::AuthService;
use crate::state::AppState;
use crate::views::{FlashKind, PageContext, set_flash};

// =============================================================================
// Form Types
// =============================================================================

/// Profile form data.
#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    pub name: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Account overview page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct AccountIndexTemplate {
    pub ctx: PageContext,
    pub user: User,
    pub orders: Vec<OrderSummary>,
    pub default_address: Option<Address>,
}

/// Order detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub ctx: PageContext,
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Saved addresses page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/addresses.html")]
pub struct AddressesTemplate {
    pub ctx: PageContext,
    pub addresses: Vec<Address>,
}

/// New/edit address page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/address_form.html")]
pub struct AddressFormTemplate {
    pub ctx: PageContext,
    /// The address being edited, `None` when adding one.
    pub address: Option<Address>,
    pub action: String,
}

impl AddressFormTemplate {
    fn field<'a>(&'a self, get: impl Fn(&'a Address) -> &'a str) -> &'a str {
        self.address.as_ref().map_or("", get)
    }

    #[must_use]
    pub fn full_name(&self) -> &str {
        self.field(|a| a.full_name.as_str())
    }

    #[must_use]
    pub fn line1(&self) -> &str {
        self.field(|a| a.line1.as_str())
    }

    #[must_use]
    pub fn line2(&self) -> &str {
        self.field(|a| a.line2.as_deref().unwrap_or_default())
    }

    #[must_use]
    pub fn city(&self) -> &str {
        self.field(|a| a.city.as_str())
    }

    #[must_use]
    pub fn region(&self) -> &str {
        self.field(|a| a.region.as_str())
    }

    #[must_use]
    pub fn postal_code(&self) -> &str {
        self.field(|a| a.postal_code.as_str())
    }

    #[must_use]
    pub fn country(&self) -> &str {
        self.field(|a| a.country.as_str())
    }

    #[must_use]
    pub fn is_default(&self) -> bool {
        self.address.as_ref().is_some_and(|a| a.is_default)
    }
}

// =============================================================================
// Profile
// =============================================================================

/// Display the account overview: profile, order history, default address.
#[instrument(skip(state, ctx, user))]
pub async fn index(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireUser(user): RequireUser,
) -> PageResult<AccountIndexTemplate> {
    let profile = UserRepository::new(state.pool())
        .get_by_id(user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;
    let orders = OrderRepository::new(state.pool()).list_for_user(user.id).await?;
    let default_address = AddressRepository::new(state.pool())
        .get_default(user.id)
        .await?;

    Ok(AccountIndexTemplate {
        ctx,
        user: profile,
        orders,
        default_address,
    })
}

/// Update the display name.
#[instrument(skip(state, session, user, form))]
pub async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    RequireUser(user): RequireUser,
    Form(form): Form<ProfileForm>,
) -> PageResult<Redirect> {
    match AuthService::new(state.pool(), state.tokens())
        .update_name(user.id, &form.name)
        .await
    {
        Ok(_) => set_flash(&session, FlashKind::Success, "Profile updated").await,
        Err(err) => {
            let err = AppError::from(err);
            if err.status().is_server_error() {
                return Err(err.into());
            }
            set_flash(&session, FlashKind::Error, err.public_message()).await;
        }
    }
    Ok(Redirect::to("/account"))
}

// =============================================================================
// Orders
// =============================================================================

/// Display one of the user's orders.
#[instrument(skip(state, ctx, user))]
pub async fn order(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireUser(user): RequireUser,
    Path(id): Path<OrderId>,
) -> PageResult<OrderShowTemplate> {
    let orders = OrderRepository::new(state.pool());
    let order = orders
        .get_for_user(user.id, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
    let items = orders.items(order.id).await?;

    Ok(OrderShowTemplate { ctx, order, items })
}

// =============================================================================
// Addresses
// =============================================================================

/// List saved addresses.
#[instrument(skip(state, ctx, user))]
pub async fn addresses(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireUser(user): RequireUser,
) -> PageResult<AddressesTemplate> {
    let addresses = AddressRepository::new(state.pool()).list(user.id).await?;
    Ok(AddressesTemplate { ctx, addresses })
}

/// Display the new address form.
pub async fn new_address(ctx: PageContext) -> AddressFormTemplate {
    AddressFormTemplate {
        ctx,
        address: None,
        action: "/account/addresses".to_string(),
    }
}

/// Save a new address.
#[instrument(skip(state, session, user, form))]
pub async fn create_address(
    State(state): State<AppState>,
    session: Session,
    RequireUser(user): RequireUser,
    Form(form): Form<AddressInput>,
) -> PageResult<Redirect> {
    let shipping = match form.validate() {
        Ok(shipping) => shipping,
        Err(message) => {
            set_flash(&session, FlashKind::Error, sentence(&message)).await;
            return Ok(Redirect::to("/account/addresses/new"));
        }
    };
    AddressRepository::new(state.pool())
        .create(user.id, &shipping, form.wants_default())
        .await?;
    set_flash(&session, FlashKind::Success, "Address saved").await;
    Ok(Redirect::to("/account/addresses"))
}

/// Display the edit form for a saved address.
#[instrument(skip(state, ctx, user))]
pub async fn edit_address(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireUser(user): RequireUser,
    Path(id): Path<AddressId>,
) -> PageResult<AddressFormTemplate> {
    let address = AddressRepository::new(state.pool())
        .get(user.id, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Address not found".to_string()))?;

    Ok(AddressFormTemplate {
        ctx,
        action: format!("/account/addresses/{}", address.id),
        address: Some(address),
    })
}

/// Save changes to an address.
#[instrument(skip(state, session, user, form))]
pub async fn update_address(
    State(state): State<AppState>,
    session: Session,
    RequireUser(user): RequireUser,
    Path(id): Path<AddressId>,
    Form(form): Form<AddressInput>,
) -> PageResult<Redirect> {
    let shipping = match form.validate() {
        Ok(shipping) => shipping,
        Err(message) => {
            set_flash(&session, FlashKind::Error, sentence(&message)).await;
            return Ok(Redirect::to(&format!("/account/addresses/{id}/edit")));
        }
    };
    AddressRepository::new(state.pool())
        .update(user.id, id, &shipping, form.wants_default())
        .await?;
    set_flash(&session, FlashKind::Success, "Address updated").await;
    Ok(Redirect::to("/account/addresses"))
}

/// Make an address the default.
#[instrument(skip(state, user))]
pub async fn set_default_address(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<AddressId>,
) -> PageResult<Redirect> {
    AddressRepository::new(state.pool())
        .set_default(user.id, id)
        .await?;
    Ok(Redirect::to("/account/addresses"))
}

/// Delete an address.
#[instrument(skip(state, session, user))]
pub async fn delete_address(
    State(state): State<AppState>,
    session: Session,
    RequireUser(user): RequireUser,
    Path(id): Path<AddressId>,
) -> PageResult<Redirect> {
    AddressRepository::new(state.pool())
        .delete(user.id, id)
        .await?;
    set_flash(&session, FlashKind::Success, "Address removed").await;
    Ok(Redirect::to("/account/addresses"))
}

