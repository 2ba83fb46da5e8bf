//! Core types for Shopfront.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod rating;
pub mod role;
pub mod slug;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{Money, round_cents};
pub use rating::{Rating, RatingError};
pub use role::Role;
pub use slug::slugify;
pub use status::{DiscountKind, OrderStatus};
