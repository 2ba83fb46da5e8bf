//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Password login, JWT issuing, refresh-token rotation
//! - `protection` - Request shield (bots, signup rate limits, email screening)
//! - `cart` - Session cart and pricing
//! - `checkout` - Coupons and order placement
//! - `reviews` - Review submission rules

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod protection;
pub mod reviews;
