//! HTTP route handlers and router assembly.

pub mod orders;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::state::AppState;

/// Build the API router. Health endpoints and middleware are layered on in
/// [`crate::app`].
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/orders",
            post(orders::create_order).get(orders::list_orders),
        )
        .route("/api/orders/me", get(orders::list_my_orders))
        .route("/api/orders/{id}", patch(orders::update_order_status))
}
