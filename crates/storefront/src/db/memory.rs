//! In-memory implementation of [`OrderStore`] for testing and development.
//!
//! A single mutex guards all collections, so the "atomic" placement path is
//! trivially atomic: the lock is held across every step. The
//! `supports_transactions` flag is configurable so the placement service's
//! compensating path can be exercised against this backend too.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use velour_core::{Email, NewOrder, Order, OrderId, OrderStatus, ProductId, UserId};

use super::{AtomicPlaceError, OrderStore, ProductRecord, StoreError, UserRecord, mint_order_id};

#[derive(Default)]
struct Inner {
    products: HashMap<ProductId, ProductRecord>,
    orders: Vec<Order>,
    users: HashMap<UserId, UserRecord>,
}

/// In-memory order store. Cheap to clone via interior `Arc` at the caller
/// (hand it around as `Arc<MemoryStore>` / `Arc<dyn OrderStore>`).
pub struct MemoryStore {
    inner: Mutex<Inner>,
    transactional: bool,
}

impl MemoryStore {
    /// Create an empty store advertising the given transaction capability.
    #[must_use]
    pub fn new(transactional: bool) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            transactional,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock only happens on a panic mid-mutation; recover the
        // guard rather than poisoning every later call.
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Seed a product document.
    pub fn seed_product(&self, product: ProductRecord) {
        self.lock().products.insert(product.id.clone(), product);
    }

    /// Seed a user document.
    pub fn seed_user(&self, user: UserRecord) {
        self.lock().users.insert(user.id.clone(), user);
    }

    /// Current quantity of a product, if it exists.
    #[must_use]
    pub fn product_quantity(&self, id: &ProductId) -> Option<i64> {
        self.lock().products.get(id).map(|p| p.quantity)
    }

    /// Number of persisted order documents.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.lock().orders.len()
    }

    /// Order ids attached to a user, in append order.
    #[must_use]
    pub fn user_orders(&self, id: &UserId) -> Vec<OrderId> {
        self.lock()
            .users
            .get(id)
            .map(|u| u.orders.clone())
            .unwrap_or_default()
    }

    /// Newsletter flag of a user.
    #[must_use]
    pub fn newsletter_flag(&self, id: &UserId) -> bool {
        self.lock().users.get(id).is_some_and(|u| u.newsletter)
    }
}

impl Inner {
    fn try_decrement(&mut self, product: &ProductId, qty: i64) -> bool {
        match self.products.get_mut(product) {
            Some(record) if record.quantity >= qty => {
                record.quantity -= qty;
                true
            }
            _ => false,
        }
    }

    fn insert_order(&mut self, order: NewOrder) -> Order {
        let order = Order::from_new(mint_order_id(), order, Utc::now());
        self.orders.push(order.clone());
        order
    }

    fn link_order(&mut self, user: &UserId, order: &OrderId) {
        if let Some(record) = self.users.get_mut(user) {
            record.orders.push(order.clone());
        }
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    fn supports_transactions(&self) -> bool {
        self.transactional
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn place_order_atomic(&self, order: NewOrder) -> Result<Order, AtomicPlaceError> {
        let mut inner = self.lock();

        // Sequential conditional decrements under one lock; undoing applied
        // decrements before returning keeps the scope all-or-nothing, same
        // shape as the driver transaction. Repeated product lines get the
        // same treatment as they would from the engine.
        let mut applied: Vec<(ProductId, i64)> = Vec::new();
        for item in &order.items {
            let Some(product) = &item.product_id else {
                continue;
            };
            if inner.try_decrement(product, item.qty) {
                applied.push((product.clone(), item.qty));
            } else {
                for (product, qty) in applied {
                    if let Some(record) = inner.products.get_mut(&product) {
                        record.quantity += qty;
                    }
                }
                return Err(AtomicPlaceError::InsufficientStock(item.name.clone()));
            }
        }

        let user = order.user.clone();
        let order = inner.insert_order(order);
        if let Some(user) = user {
            inner.link_order(&user, &order.id);
        }
        Ok(order)
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        Ok(self.lock().insert_order(order))
    }

    async fn try_decrement_stock(&self, product: &ProductId, qty: i64) -> Result<bool, StoreError> {
        Ok(self.lock().try_decrement(product, qty))
    }

    async fn increment_stock(&self, product: &ProductId, qty: i64) -> Result<(), StoreError> {
        if let Some(record) = self.lock().products.get_mut(product) {
            record.quantity += qty;
        }
        Ok(())
    }

    async fn link_order_to_user(&self, user: &UserId, order: &OrderId) -> Result<(), StoreError> {
        self.lock().link_order(user, order);
        Ok(())
    }

    async fn find_order(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.lock().orders.iter().find(|o| &o.id == id).cloned())
    }

    async fn set_order_status(&self, id: &OrderId, status: OrderStatus) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(order) = inner.orders.iter_mut().find(|o| &o.id == id) {
            order.status = status;
            order.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn orders_for_user(&self, user: &UserId) -> Result<Vec<Order>, StoreError> {
        let mut orders: Vec<Order> = self
            .lock()
            .orders
            .iter()
            .rev()
            .filter(|o| o.user.as_ref() == Some(user))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn recent_orders(&self, limit: i64) -> Result<Vec<Order>, StoreError> {
        let mut orders: Vec<Order> = self.lock().orders.iter().rev().cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(orders)
    }

    async fn flag_newsletter_by_email(&self, email: &Email) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(user) = inner.users.values_mut().find(|u| &u.email == email) {
            user.newsletter = true;
        }
        Ok(())
    }
}
