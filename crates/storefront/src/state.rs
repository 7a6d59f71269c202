//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::OrderStore;
use crate::services::{Mailer, OrderService};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`; provides access to configuration, the order
/// store, and the order service.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    store: Arc<dyn OrderStore>,
    orders: OrderService,
}

impl AppState {
    /// Create application state from configuration, a store backend, and a
    /// mailer.
    #[must_use]
    pub fn new(config: AppConfig, store: Arc<dyn OrderStore>, mailer: Mailer) -> Self {
        let orders = OrderService::new(Arc::clone(&store), mailer, config.admin_email.clone());
        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                orders,
            }),
        }
    }

    /// Get a reference to the configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Get a reference to the order store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn OrderStore> {
        &self.inner.store
    }

    /// Get a reference to the order service.
    #[must_use]
    pub fn orders(&self) -> &OrderService {
        &self.inner.orders
    }
}
