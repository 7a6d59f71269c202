//! Order placement and status transitions.
//!
//! This is the one subsystem where correctness under concurrency and partial
//! failure matters. [`OrderService::place`] re-prices the cart server-side,
//! then applies the order through one of two paths chosen by the store's
//! transaction capability:
//!
//! - **atomic**: the store wraps order insert, conditional stock decrements,
//!   and user linkage in one transaction scope; a mid-sequence failure leaves
//!   zero visible effects.
//! - **compensating**: the order is inserted first, the user link is
//!   best-effort, and stock is decremented one item at a time; a failed
//!   decrement increments back every prior success. The order row is left in
//!   place on rollback, mirroring the long-standing behavior of this flow
//!   (see DESIGN.md).
//!
//! Effects fall into two classes and the split is structural: must-succeed
//! effects run inside the placement path above; best-effort effects
//! (newsletter flag, confirmation and admin emails) run strictly after it,
//! are never awaited by the caller beyond initiation, and only log on
//! failure.

use std::sync::Arc;

use velour_core::{
    Email, LineItem, NewOrder, Order, OrderStatus, ProductId, ShippingDetails, UserId,
    order_id_candidates,
    pricing::{self, PricingError},
};

use super::mailer::Mailer;
use crate::db::{AtomicPlaceError, OrderStore, StoreError};

/// Default delivery option label when the client omits one.
const DEFAULT_DELIVERY_OPTION: &str = "standard";
/// Default payment method label when the client omits one (cash on delivery).
const DEFAULT_PAYMENT_METHOD: &str = "cod";

/// A validated checkout submission.
#[derive(Debug, Clone)]
pub struct Checkout {
    pub items: Vec<LineItem>,
    pub shipping: ShippingDetails,
    pub delivery_option: Option<String>,
    pub payment_method: Option<String>,
    pub newsletter: bool,
    /// Authenticated principal, when present; guest checkout otherwise.
    pub user: Option<UserId>,
}

/// Failure modes of order placement.
#[derive(Debug, thiserror::Error)]
pub enum PlaceOrderError {
    /// The cart failed validation; nothing reached storage.
    #[error(transparent)]
    Invalid(#[from] PricingError),

    /// A conditional decrement found insufficient stock; carries the item
    /// name. Stock effects have been rolled back.
    #[error("insufficient stock for {0}")]
    InsufficientStock(String),

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failure modes of a status transition.
#[derive(Debug, thiserror::Error)]
pub enum StatusUpdateError {
    /// No candidate decoding of the supplied id matched an order.
    #[error("order not found")]
    NotFound,

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Application service for order placement, listing, and status transitions.
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    mailer: Mailer,
    admin_email: String,
}

impl OrderService {
    /// Number of orders returned by the admin listing.
    pub const RECENT_LIMIT: i64 = 200;

    pub fn new(store: Arc<dyn OrderStore>, mailer: Mailer, admin_email: String) -> Self {
        Self {
            store,
            mailer,
            admin_email,
        }
    }

    /// Place an order.
    ///
    /// Prices the cart server-side, applies the order through the store's
    /// atomic path or the compensating fallback, then kicks off best-effort
    /// side effects. Returns the persisted order on success.
    ///
    /// # Errors
    ///
    /// [`PlaceOrderError::Invalid`] for a bad cart (detected before any
    /// mutation), [`PlaceOrderError::InsufficientStock`] when stock ran out,
    /// [`PlaceOrderError::Store`] for anything else.
    pub async fn place(&self, checkout: Checkout) -> Result<Order, PlaceOrderError> {
        let delivery_option = checkout
            .delivery_option
            .unwrap_or_else(|| DEFAULT_DELIVERY_OPTION.to_owned());
        let payment_method = checkout
            .payment_method
            .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_owned());

        let quote = pricing::price_cart(&checkout.items, &delivery_option)?;

        let new_order = NewOrder {
            user: checkout.user,
            items: checkout.items,
            shipping: checkout.shipping,
            subtotal: quote.subtotal,
            shipping_cost: quote.shipping_cost,
            total: quote.total,
            delivery_option,
            payment_method,
            newsletter: checkout.newsletter,
        };

        let order = if self.store.supports_transactions() {
            self.store
                .place_order_atomic(new_order)
                .await
                .map_err(|err| match err {
                    AtomicPlaceError::InsufficientStock(name) => {
                        PlaceOrderError::InsufficientStock(name)
                    }
                    AtomicPlaceError::Store(err) => PlaceOrderError::Store(err),
                })?
        } else {
            self.place_with_compensation(new_order).await?
        };

        tracing::info!(
            order_id = %order.id,
            user_id = order.user.as_ref().map(ToString::to_string),
            subtotal = %order.subtotal,
            total = %order.total,
            "order created"
        );

        // Best-effort effects, strictly after the critical path.
        if order.newsletter {
            self.flag_newsletter(&order.shipping.email).await;
        }
        self.spawn_notifications(order.clone());

        Ok(order)
    }

    /// Fallback for deployments without multi-document transactions: create
    /// the order, link the user best-effort, then decrement stock with
    /// manual compensation on failure.
    async fn place_with_compensation(&self, new_order: NewOrder) -> Result<Order, PlaceOrderError> {
        let order = self.store.insert_order(new_order).await?;

        if let Some(user) = &order.user
            && let Err(err) = self.store.link_order_to_user(user, &order.id).await
        {
            tracing::warn!(
                error = %err,
                order_id = %order.id,
                "failed to attach order to user record (non-fatal)"
            );
        }

        let mut reserved: Vec<(ProductId, i64)> = Vec::new();
        for item in &order.items {
            let Some(product) = &item.product_id else {
                continue;
            };
            match self.store.try_decrement_stock(product, item.qty).await {
                Ok(true) => reserved.push((product.clone(), item.qty)),
                Ok(false) => {
                    self.release(&reserved).await;
                    // The order row stays behind; see module docs.
                    return Err(PlaceOrderError::InsufficientStock(item.name.clone()));
                }
                Err(err) => {
                    self.release(&reserved).await;
                    tracing::error!(error = %err, order_id = %order.id, "stock update failed");
                    return Err(PlaceOrderError::Store(err));
                }
            }
        }

        Ok(order)
    }

    /// Increment back previously decremented stock.
    async fn release(&self, reserved: &[(ProductId, i64)]) {
        for (product, qty) in reserved {
            if let Err(err) = self.store.increment_stock(product, *qty).await {
                tracing::error!(error = %err, product = %product, "rollback failed for product");
            }
        }
    }

    async fn flag_newsletter(&self, email: &Email) {
        if let Err(err) = self.store.flag_newsletter_by_email(email).await {
            tracing::error!(error = %err, "failed to update newsletter flag");
        }
    }

    /// Fire purchaser and admin notifications without blocking the response.
    fn spawn_notifications(&self, order: Order) {
        let mailer = self.mailer.clone();
        let admin_email = self.admin_email.clone();
        tokio::spawn(async move {
            let (confirmation, alert) = tokio::join!(
                mailer.send_order_confirmation(&order),
                mailer.send_admin_alert(&admin_email, &order),
            );
            if let Err(err) = confirmation {
                tracing::error!(error = %err, order_id = %order.id, "user mail failed");
            }
            if let Err(err) = alert {
                tracing::error!(error = %err, order_id = %order.id, "admin mail failed");
            }
        });
    }

    /// Apply a status transition to the order identified by `raw_id`.
    ///
    /// The id may arrive in several encodings; candidates are tried in order
    /// and the first match wins. Cancelling a not-yet-cancelled order
    /// restocks its product-bearing lines best-effort per item before the
    /// status write.
    ///
    /// # Errors
    ///
    /// [`StatusUpdateError::NotFound`] when no candidate matches,
    /// [`StatusUpdateError::Store`] on storage failure.
    pub async fn update_status(
        &self,
        raw_id: &str,
        status: OrderStatus,
    ) -> Result<(), StatusUpdateError> {
        let candidates = order_id_candidates(raw_id);
        let mut order = None;
        for candidate in &candidates {
            if let Some(found) = self.store.find_order(candidate).await? {
                order = Some(found);
                break;
            }
            tracing::debug!(candidate = %candidate, "order id candidate missed");
        }
        let Some(order) = order else {
            tracing::warn!(raw_id, ?candidates, "order not found after trying all id candidates");
            return Err(StatusUpdateError::NotFound);
        };

        if status == OrderStatus::Cancelled && order.status != OrderStatus::Cancelled {
            for (product, qty) in order.stocked_items() {
                if let Err(err) = self.store.increment_stock(product, qty).await {
                    tracing::error!(
                        error = %err,
                        product = %product,
                        order_id = %order.id,
                        "restock failed, continuing with remaining items"
                    );
                }
            }
        }

        self.store.set_order_status(&order.id, status).await?;
        Ok(())
    }

    /// Orders owned by a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    pub async fn list_for_user(&self, user: &UserId) -> Result<Vec<Order>, StoreError> {
        self.store.orders_for_user(user).await
    }

    /// Recent orders across all users, newest first, bounded.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    pub async fn list_recent(&self) -> Result<Vec<Order>, StoreError> {
        self.store.recent_orders(Self::RECENT_LIMIT).await
    }
}
