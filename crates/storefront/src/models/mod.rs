//! Domain models for the storefront.

pub mod address;
pub mod catalog;
pub mod coupon;
pub mod order;
pub mod session;
pub mod user;

pub use address::{Address, AddressInput};
pub use catalog::{Product, ProductInput, ProductListing, ProductSort, Review, ReviewSummary};
pub use coupon::{Coupon, CouponInput};
pub use order::{Order, OrderItem, OrderSummary, ShippingAddress};
pub use session::{CurrentUser, SessionRefreshed, session_keys};
pub use user::User;
