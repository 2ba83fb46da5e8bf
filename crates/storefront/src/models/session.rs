//! Request-scoped identity types.
//!
//! The session guard verifies the access token cookie and places these in
//! request extensions; extractors in `middleware::auth` read them back.

use serde::{Deserialize, Serialize};

use shopfront_core::{Role, UserId};

/// The identity carried by a verified access token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address, as issued into the token.
    pub email: String,
    /// User's role, as issued into the token.
    pub role: Role,
    /// CSRF token bound to this access token.
    #[serde(skip_serializing)]
    pub csrf_token: String,
    /// Unix timestamp at which the access token expires.
    pub expires_at: i64,
}

impl CurrentUser {
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Marker placed in extensions when the guard rotated tokens during this request.
///
/// Carries the CSRF token of the access token that was replaced, which scripts
/// may still be sending until they see the new one.
#[derive(Debug, Clone)]
pub struct SessionRefreshed {
    pub previous_csrf: Option<String>,
}

/// Keys for data held in the server-side session.
pub mod session_keys {
    /// Shopping cart lines.
    pub const CART: &str = "cart";

    /// Coupon code applied to the cart.
    pub const CART_COUPON: &str = "cart_coupon";

    /// One-shot message shown on the next page render.
    pub const FLASH: &str = "flash";
}
