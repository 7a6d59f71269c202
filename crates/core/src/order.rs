//! Order domain types.
//!
//! An [`Order`] owns its line items and shipping snapshot outright: values are
//! copied in at creation time, so later catalog or account changes never
//! retroactively alter a historical order. After creation the status field is
//! the only thing that may change.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Email, OrderId, OrderStatus, ProductId, UserId};

/// One entry in a cart or order: a product reference (optional, ad-hoc items
/// carry none), a price/name snapshot, a quantity, and an optional size label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<ProductId>,
    pub name: String,
    pub price: Decimal,
    pub qty: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

/// Shipping and contact details captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub address: String,
    pub city: String,
    pub postal: String,
    pub phone: String,
    pub country: String,
}

/// A fully priced order ready to be persisted. Carries everything an
/// [`Order`] does except the identity and timestamps the store assigns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserId>,
    pub items: Vec<LineItem>,
    pub shipping: ShippingDetails,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub total: Decimal,
    pub delivery_option: String,
    pub payment_method: String,
    pub newsletter: bool,
}

/// A persisted order document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserId>,
    pub items: Vec<LineItem>,
    pub shipping: ShippingDetails,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub total: Decimal,
    pub delivery_option: String,
    pub payment_method: String,
    pub newsletter: bool,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Materialize an order from its store-assigned identity and creation time.
    #[must_use]
    pub fn from_new(id: OrderId, new: NewOrder, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user: new.user,
            items: new.items,
            shipping: new.shipping,
            subtotal: new.subtotal,
            shipping_cost: new.shipping_cost,
            total: new.total,
            delivery_option: new.delivery_option,
            payment_method: new.payment_method,
            newsletter: new.newsletter,
            status: OrderStatus::Pending,
            created_at,
            updated_at: created_at,
        }
    }

    /// Line items that reference a catalog product, paired with the quantity
    /// to reserve or restock. Ad-hoc items are skipped.
    pub fn stocked_items(&self) -> impl Iterator<Item = (&ProductId, i64)> {
        self.items
            .iter()
            .filter_map(|item| item.product_id.as_ref().map(|id| (id, item.qty)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn shipping() -> ShippingDetails {
        ShippingDetails {
            first_name: "A".to_owned(),
            last_name: "B".to_owned(),
            email: Email::parse("test@example.com").unwrap(),
            address: "street".to_owned(),
            city: "city".to_owned(),
            postal: "0000".to_owned(),
            phone: "1234".to_owned(),
            country: "PK".to_owned(),
        }
    }

    #[test]
    fn test_from_new_starts_pending() {
        let new = NewOrder {
            user: None,
            items: vec![LineItem {
                product_id: None,
                name: "Test".to_owned(),
                price: Decimal::new(100, 0),
                qty: 1,
                size: None,
            }],
            shipping: shipping(),
            subtotal: Decimal::new(100, 0),
            shipping_cost: Decimal::ZERO,
            total: Decimal::new(100, 0),
            delivery_option: "standard".to_owned(),
            payment_method: "cod".to_owned(),
            newsletter: false,
        };
        let id = OrderId::parse("64b1f0a2c3d4e5f60718293a").unwrap();
        let order = Order::from_new(id.clone(), new, Utc::now());
        assert_eq!(order.id, id);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.created_at, order.updated_at);
    }

    #[test]
    fn test_stocked_items_skips_ad_hoc_lines() {
        let product = ProductId::parse("64b1f0a2c3d4e5f60718293b").unwrap();
        let order = Order {
            id: OrderId::parse("64b1f0a2c3d4e5f60718293a").unwrap(),
            user: None,
            items: vec![
                LineItem {
                    product_id: Some(product.clone()),
                    name: "Stocked".to_owned(),
                    price: Decimal::new(100, 0),
                    qty: 3,
                    size: Some("50ml".to_owned()),
                },
                LineItem {
                    product_id: None,
                    name: "Ad hoc".to_owned(),
                    price: Decimal::new(50, 0),
                    qty: 1,
                    size: None,
                },
            ],
            shipping: shipping(),
            subtotal: Decimal::new(350, 0),
            shipping_cost: Decimal::ZERO,
            total: Decimal::new(350, 0),
            delivery_option: "standard".to_owned(),
            payment_method: "cod".to_owned(),
            newsletter: false,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let stocked: Vec<_> = order.stocked_items().collect();
        assert_eq!(stocked, vec![(&product, 3)]);
    }

    #[test]
    fn test_order_serializes_camel_case() {
        let new = NewOrder {
            user: None,
            items: vec![],
            shipping: shipping(),
            subtotal: Decimal::ZERO,
            shipping_cost: Decimal::ZERO,
            total: Decimal::ZERO,
            delivery_option: "standard".to_owned(),
            payment_method: "cod".to_owned(),
            newsletter: true,
        };
        let json = serde_json::to_value(&new).unwrap();
        assert!(json.get("shippingCost").is_some());
        assert!(json.get("deliveryOption").is_some());
        assert!(json.get("shipping_cost").is_none());
    }
}
