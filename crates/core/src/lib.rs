//! Shopfront Core - Shared domain types.
//!
//! This crate provides the types shared by every Shopfront component:
//! - `storefront` - Public shop, customer account area, and `/admin` panel
//! - `cli` - Command-line tools for migrations, users, and catalog seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP. With the `postgres` feature enabled the types gain `sqlx`
//! encode/decode implementations so repositories can bind them directly.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, emails, money, roles, order statuses, ratings, slugs

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
