//! Order store abstraction.
//!
//! Everything the order core needs from storage sits behind the [`OrderStore`]
//! trait: primitive single-document operations (conditional stock decrement,
//! order insert, user linkage) plus one composite operation,
//! [`OrderStore::place_order_atomic`], for backends that can wrap the whole
//! placement in a multi-document transaction. Backends advertise that
//! capability through [`OrderStore::supports_transactions`]; the placement
//! service picks the atomic path or the compensating sequence accordingly.
//!
//! # Backends
//!
//! - [`mongo::MongoStore`] - production backend on the MongoDB driver
//! - [`memory::MemoryStore`] - in-process backend for tests and local dev
//!
//! The conditional decrement is the load-bearing primitive: "subtract `qty`
//! where `quantity >= qty`" must be evaluated by the storage engine as one
//! compare-and-swap, never as a read-then-write pair in application code.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use velour_core::{Email, NewOrder, Order, OrderId, OrderStatus, ProductId, Role, UserId};

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Errors surfaced by storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Driver or transport failure.
    #[error("database error: {0}")]
    Backend(#[from] mongodb::error::Error),

    /// A stored document failed to round-trip through the domain model.
    #[error("malformed document: {0}")]
    Corrupt(String),
}

/// Outcome of the composite atomic placement operation.
#[derive(Debug, thiserror::Error)]
pub enum AtomicPlaceError {
    /// A conditional decrement matched nothing; carries the offending item
    /// name. The whole scope is rolled back before this is returned.
    #[error("insufficient stock for {0}")]
    InsufficientStock(String),

    /// Any other storage failure; the scope is rolled back.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Product document as the order core sees it: a price/name snapshot source
/// and one mutable `quantity` field. Catalog management owns the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub quantity: i64,
}

/// User document as the order core sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub role: Role,
    #[serde(default)]
    pub newsletter: bool,
    #[serde(default)]
    pub orders: Vec<OrderId>,
}

/// Storage operations backing order placement and status transitions.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Whether this backend can run the placement as one multi-document
    /// transaction. When false, the placement service substitutes the
    /// compensating sequence built on the primitives below.
    fn supports_transactions(&self) -> bool;

    /// Cheap connectivity check for readiness probes.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Place an order in one atomic scope: insert the order, conditionally
    /// decrement stock for every product-bearing line, and append the order
    /// to the owning user's list. Commits only if every step succeeds; any
    /// failure leaves zero visible effects.
    async fn place_order_atomic(&self, order: NewOrder) -> Result<Order, AtomicPlaceError>;

    /// Insert an order document and return it with its assigned identity.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError>;

    /// Conditionally decrement a product's quantity. Returns `Ok(true)` when
    /// the guard (`quantity >= qty`) held and the decrement applied,
    /// `Ok(false)` when it did not (including an unknown product id).
    async fn try_decrement_stock(&self, product: &ProductId, qty: i64) -> Result<bool, StoreError>;

    /// Increment a product's quantity (compensation and restock).
    async fn increment_stock(&self, product: &ProductId, qty: i64) -> Result<(), StoreError>;

    /// Append an order id to a user's order list. A missing user is not an
    /// error; callers treat this as best-effort.
    async fn link_order_to_user(&self, user: &UserId, order: &OrderId) -> Result<(), StoreError>;

    /// Fetch an order by exact id.
    async fn find_order(&self, id: &OrderId) -> Result<Option<Order>, StoreError>;

    /// Overwrite the status field of an order. No other field is touched.
    async fn set_order_status(&self, id: &OrderId, status: OrderStatus) -> Result<(), StoreError>;

    /// Orders owned by a user, newest first.
    async fn orders_for_user(&self, user: &UserId) -> Result<Vec<Order>, StoreError>;

    /// Most recent orders across all users, newest first, bounded.
    async fn recent_orders(&self, limit: i64) -> Result<Vec<Order>, StoreError>;

    /// Set the newsletter flag on the user account matching an email, if one
    /// exists. Best-effort from the caller's point of view.
    async fn flag_newsletter_by_email(&self, email: &Email) -> Result<(), StoreError>;
}

/// Mint a fresh order id in the store's object-id format.
pub(crate) fn mint_order_id() -> OrderId {
    let hex = mongodb::bson::oid::ObjectId::new().to_hex();
    OrderId::parse(&hex).expect("driver object ids are 24-char hex")
}
