//! Server-side cart pricing.
//!
//! Totals submitted by clients are never trusted: the subtotal is recomputed
//! here from the line items, the shipping surcharge is derived from the
//! delivery option, and the stored total is always `subtotal + shipping`.
//!
//! Unit prices are taken from the submitted line items rather than re-fetched
//! from the catalog; see DESIGN.md for the recorded hardening opportunity.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::order::LineItem;

/// Delivery option label that attracts the flat shipping surcharge.
pub const STANDARD_DELIVERY: &str = "standard";

/// Flat shipping surcharge for standard delivery, in rupees.
#[must_use]
pub fn shipping_flat_rate() -> Decimal {
    Decimal::new(200, 0)
}

/// Errors detected while pricing a cart. These map to `InvalidInput` at the
/// API boundary and are always raised before any storage mutation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PricingError {
    /// The cart has no line items.
    #[error("cart is empty")]
    EmptyCart,
    /// A line item has a non-positive price or quantity.
    #[error("invalid item in cart: {name}")]
    InvalidItem { name: String },
}

/// A priced cart: recomputed subtotal, shipping surcharge, and their sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub total: Decimal,
}

/// Price a cart for the given delivery option.
///
/// # Errors
///
/// Returns [`PricingError::EmptyCart`] for an empty cart and
/// [`PricingError::InvalidItem`] for any line with price <= 0 or qty <= 0.
pub fn price_cart(items: &[LineItem], delivery_option: &str) -> Result<Quote, PricingError> {
    if items.is_empty() {
        return Err(PricingError::EmptyCart);
    }

    let mut subtotal = Decimal::ZERO;
    for item in items {
        if item.price <= Decimal::ZERO || item.qty <= 0 {
            return Err(PricingError::InvalidItem {
                name: item.name.clone(),
            });
        }
        subtotal += item.price * Decimal::from(item.qty);
    }

    let shipping_cost = if delivery_option == STANDARD_DELIVERY {
        shipping_flat_rate()
    } else {
        Decimal::ZERO
    };

    Ok(Quote {
        subtotal,
        shipping_cost,
        total: subtotal + shipping_cost,
    })
}
