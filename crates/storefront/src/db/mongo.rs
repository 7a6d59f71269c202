//! MongoDB implementation of [`OrderStore`].
//!
//! # Storage model
//!
//! Collection-per-entity: `orders`, `products`, `users`. Documents round-trip
//! through `serde_json::Value` into BSON, with the domain `id` field mapped to
//! MongoDB's `_id` convention. Ids are stored as their 24-char hex strings.
//!
//! # Transactions
//!
//! Whether the deployment supports multi-document transactions is detected
//! once at connect time (standalone `mongod` does not; replica sets and
//! `mongos` do) and can be forced either way from configuration. The
//! conditional stock decrement itself never needs a transaction: it is a
//! single `update_one` with a `quantity >= qty` filter, evaluated atomically
//! by the server.

use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document, doc};
use mongodb::{Client, ClientSession, Collection, Database};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;

use velour_core::{Email, NewOrder, Order, OrderId, OrderStatus, ProductId, UserId};

use super::{AtomicPlaceError, OrderStore, StoreError, mint_order_id};

/// Convert a domain value into a BSON document, renaming `id` to `_id`.
fn to_document<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    let json = serde_json::to_value(value)
        .map_err(|e| StoreError::Corrupt(format!("failed to serialize document: {e}")))?;
    let bson = mongodb::bson::to_bson(&json)
        .map_err(|e| StoreError::Corrupt(format!("failed to convert to BSON: {e}")))?;

    let Bson::Document(mut doc) = bson else {
        return Err(StoreError::Corrupt("expected a BSON document".to_owned()));
    };

    if let Some(id) = doc.remove("id") {
        doc.insert("_id", id);
    }
    Ok(doc)
}

/// Convert a BSON document back into a domain value, renaming `_id` to `id`.
fn from_document<T: DeserializeOwned>(mut doc: Document) -> Result<T, StoreError> {
    if let Some(id) = doc.remove("_id") {
        doc.insert("id", id);
    }
    let json = Bson::Document(doc).into_relaxed_extjson();
    serde_json::from_value(json)
        .map_err(|e| StoreError::Corrupt(format!("failed to deserialize document: {e}")))
}

/// Production order store backed by MongoDB.
pub struct MongoStore {
    client: Client,
    db: Database,
    transactional: bool,
}

impl MongoStore {
    /// Connect and detect transaction support.
    ///
    /// `force_transactions` overrides detection when set; leave it `None` to
    /// probe the deployment once at startup.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the connection string is invalid or
    /// the server cannot be reached.
    pub async fn connect(
        uri: &SecretString,
        database: &str,
        force_transactions: Option<bool>,
    ) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(uri.expose_secret()).await?;
        let db = client.database(database);

        let transactional = match force_transactions {
            Some(forced) => forced,
            None => Self::probe_transactions(&client, &db).await,
        };
        if transactional {
            tracing::info!("mongodb transactions available, using atomic order placement");
        } else {
            tracing::warn!(
                "mongodb transactions unavailable, falling back to best-effort order placement"
            );
        }

        Ok(Self {
            client,
            db,
            transactional,
        })
    }

    /// Run a throwaway read inside a transaction to learn whether the
    /// deployment accepts transaction numbers (standalone servers reject them
    /// on the first in-transaction operation, not at `start_transaction`).
    async fn probe_transactions(client: &Client, db: &Database) -> bool {
        let mut session = match client.start_session().await {
            Ok(session) => session,
            Err(err) => {
                tracing::debug!(error = %err, "session probe failed");
                return false;
            }
        };
        if let Err(err) = session.start_transaction().await {
            tracing::debug!(error = %err, "transaction probe failed to start");
            return false;
        }
        let probe = db
            .collection::<Document>("orders")
            .find_one(doc! { "_id": "transaction-probe" })
            .session(&mut session)
            .await;
        let _ = session.abort_transaction().await;
        match probe {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!(error = %err, "transaction probe rejected");
                false
            }
        }
    }

    fn orders(&self) -> Collection<Document> {
        self.db.collection("orders")
    }

    fn products(&self) -> Collection<Document> {
        self.db.collection("products")
    }

    fn users(&self) -> Collection<Document> {
        self.db.collection("users")
    }

    fn decrement_filter(product: &ProductId, qty: i64) -> Document {
        doc! { "_id": product.as_str(), "quantity": { "$gte": qty } }
    }

    async fn place_in_session(
        &self,
        session: &mut ClientSession,
        order: NewOrder,
    ) -> Result<Order, AtomicPlaceError> {
        let order = Order::from_new(mint_order_id(), order, Utc::now());

        self.orders()
            .insert_one(to_document(&order)?)
            .session(&mut *session)
            .await
            .map_err(StoreError::from)?;

        for item in &order.items {
            let Some(product) = &item.product_id else {
                continue;
            };
            let result = self
                .products()
                .update_one(
                    Self::decrement_filter(product, item.qty),
                    doc! { "$inc": { "quantity": -item.qty } },
                )
                .session(&mut *session)
                .await
                .map_err(StoreError::from)?;
            if result.modified_count == 0 {
                return Err(AtomicPlaceError::InsufficientStock(item.name.clone()));
            }
        }

        if let Some(user) = &order.user {
            self.users()
                .update_one(
                    doc! { "_id": user.as_str() },
                    doc! { "$push": { "orders": order.id.as_str() } },
                )
                .session(&mut *session)
                .await
                .map_err(StoreError::from)?;
        }

        Ok(order)
    }

    async fn collect_orders(
        &self,
        filter: Document,
        limit: Option<i64>,
    ) -> Result<Vec<Order>, StoreError> {
        let orders = self.orders();
        let mut find = orders.find(filter).sort(doc! { "createdAt": -1 });
        if let Some(limit) = limit {
            find = find.limit(limit);
        }
        let docs: Vec<Document> = find.await?.try_collect().await?;
        docs.into_iter().map(from_document).collect()
    }
}

#[async_trait]
impl OrderStore for MongoStore {
    fn supports_transactions(&self) -> bool {
        self.transactional
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    async fn place_order_atomic(&self, order: NewOrder) -> Result<Order, AtomicPlaceError> {
        let mut session = self.client.start_session().await.map_err(StoreError::from)?;
        session
            .start_transaction()
            .await
            .map_err(StoreError::from)?;

        match self.place_in_session(&mut session, order).await {
            Ok(placed) => {
                session
                    .commit_transaction()
                    .await
                    .map_err(StoreError::from)?;
                Ok(placed)
            }
            Err(err) => {
                if let Err(abort_err) = session.abort_transaction().await {
                    tracing::error!(error = %abort_err, "failed to abort order transaction");
                }
                Err(err)
            }
        }
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let order = Order::from_new(mint_order_id(), order, Utc::now());
        self.orders().insert_one(to_document(&order)?).await?;
        Ok(order)
    }

    async fn try_decrement_stock(&self, product: &ProductId, qty: i64) -> Result<bool, StoreError> {
        let result = self
            .products()
            .update_one(
                Self::decrement_filter(product, qty),
                doc! { "$inc": { "quantity": -qty } },
            )
            .await?;
        Ok(result.modified_count == 1)
    }

    async fn increment_stock(&self, product: &ProductId, qty: i64) -> Result<(), StoreError> {
        self.products()
            .update_one(
                doc! { "_id": product.as_str() },
                doc! { "$inc": { "quantity": qty } },
            )
            .await?;
        Ok(())
    }

    async fn link_order_to_user(&self, user: &UserId, order: &OrderId) -> Result<(), StoreError> {
        self.users()
            .update_one(
                doc! { "_id": user.as_str() },
                doc! { "$push": { "orders": order.as_str() } },
            )
            .await?;
        Ok(())
    }

    async fn find_order(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        self.orders()
            .find_one(doc! { "_id": id.as_str() })
            .await?
            .map(from_document)
            .transpose()
    }

    async fn set_order_status(&self, id: &OrderId, status: OrderStatus) -> Result<(), StoreError> {
        self.orders()
            .update_one(
                doc! { "_id": id.as_str() },
                doc! { "$set": {
                    "status": status.as_str(),
                    "updatedAt": Utc::now().to_rfc3339(),
                } },
            )
            .await?;
        Ok(())
    }

    async fn orders_for_user(&self, user: &UserId) -> Result<Vec<Order>, StoreError> {
        self.collect_orders(doc! { "user": user.as_str() }, None)
            .await
    }

    async fn recent_orders(&self, limit: i64) -> Result<Vec<Order>, StoreError> {
        self.collect_orders(doc! {}, Some(limit)).await
    }

    async fn flag_newsletter_by_email(&self, email: &Email) -> Result<(), StoreError> {
        self.users()
            .update_one(
                doc! { "email": email.as_str() },
                doc! { "$set": { "newsletter": true } },
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use velour_core::{LineItem, ShippingDetails};

    #[allow(clippy::unwrap_used)]
    fn sample_order() -> Order {
        let new = NewOrder {
            user: Some(UserId::parse("64b1f0a2c3d4e5f60718293c").unwrap()),
            items: vec![LineItem {
                product_id: Some(ProductId::parse("64b1f0a2c3d4e5f60718293b").unwrap()),
                name: "Dominus".to_owned(),
                price: Decimal::new(100, 0),
                qty: 2,
                size: Some("50ml".to_owned()),
            }],
            shipping: ShippingDetails {
                first_name: "A".to_owned(),
                last_name: "B".to_owned(),
                email: Email::parse("test@example.com").unwrap(),
                address: "street".to_owned(),
                city: "city".to_owned(),
                postal: "0000".to_owned(),
                phone: "1234".to_owned(),
                country: "PK".to_owned(),
            },
            subtotal: Decimal::new(200, 0),
            shipping_cost: Decimal::new(200, 0),
            total: Decimal::new(400, 0),
            delivery_option: "standard".to_owned(),
            payment_method: "cod".to_owned(),
            newsletter: false,
        };
        Order::from_new(mint_order_id(), new, Utc::now())
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_document_round_trip() {
        let order = sample_order();
        let doc = to_document(&order).unwrap();
        assert!(doc.contains_key("_id"));
        assert!(!doc.contains_key("id"));

        let back: Order = from_document(doc).unwrap();
        assert_eq!(back, order);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_decrement_filter_guards_quantity() {
        let product = ProductId::parse("64b1f0a2c3d4e5f60718293b").unwrap();
        let filter = MongoStore::decrement_filter(&product, 3);
        assert_eq!(
            filter,
            doc! { "_id": product.as_str(), "quantity": { "$gte": 3_i64 } }
        );
    }
}
