//! Velour Core - Shared domain library.
//!
//! This crate provides the domain model used across all Velour components:
//! - `storefront` - JSON API serving checkout and order management
//! - `integration-tests` - End-to-end tests against the storefront router
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be
//! used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, emails, and statuses
//! - [`order`] - Order, line item, and shipping snapshot types
//! - [`pricing`] - Server-side cart pricing (subtotal, shipping, total)

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod order;
pub mod pricing;
pub mod types;

pub use order::{LineItem, NewOrder, Order, ShippingDetails};
pub use pricing::{PricingError, Quote};
pub use types::*;
