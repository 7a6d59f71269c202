//! Order route handlers.
//!
//! Checkout accepts guests: a valid token attaches the order to the user,
//! anything else (including a bad token) falls back to a guest order. The
//! listing and status endpoints are authenticated.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::instrument;
use validator::Validate;

use velour_core::{Email, LineItem, Order, OrderStatus, ProductId, ShippingDetails};

use crate::error::AppError;
use crate::middleware::{OptionalPrincipal, RequireAdmin, RequireAuth};
use crate::services::orders::Checkout;
use crate::state::AppState;

/// One cart line as submitted by the client. Price and quantity are echoed
/// back by the frontend but never trusted for totals; pricing is recomputed
/// server-side.
#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemPayload {
    #[serde(default)]
    pub product_id: Option<String>,
    #[validate(length(min = 1, message = "Item name is required"))]
    pub name: String,
    pub price: Decimal,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub qty: i64,
    #[serde(default)]
    pub size: Option<String>,
}

/// Shipping block of the checkout payload.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShippingPayload {
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Address is required"))]
    pub address: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "Postal code is required"))]
    pub postal: String,
    #[validate(length(min = 1, message = "Phone is required"))]
    pub phone: String,
    #[validate(length(min = 1, message = "Country is required"))]
    pub country: String,
}

/// Checkout request body.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "Cart is empty"), nested)]
    pub items: Vec<OrderItemPayload>,
    #[validate(nested)]
    pub shipping: ShippingPayload,
    #[serde(default)]
    pub delivery_option: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub newsletter: bool,
}

/// Status update request body. The field is optional so a missing key can be
/// reported as a 400 rather than a deserialization failure.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
}

fn parse_line_item(payload: OrderItemPayload) -> Result<LineItem, AppError> {
    let product_id = payload
        .product_id
        .as_deref()
        .map(ProductId::parse)
        .transpose()
        .map_err(|e| AppError::Invalid(format!("Invalid product id: {e}")))?;
    Ok(LineItem {
        product_id,
        name: payload.name,
        price: payload.price,
        qty: payload.qty,
        size: payload.size,
    })
}

fn parse_shipping(payload: ShippingPayload) -> Result<ShippingDetails, AppError> {
    let email = Email::parse(&payload.email).map_err(|e| AppError::Invalid(e.to_string()))?;
    Ok(ShippingDetails {
        first_name: payload.first_name,
        last_name: payload.last_name,
        email,
        address: payload.address,
        city: payload.city,
        postal: payload.postal,
        phone: payload.phone,
        country: payload.country,
    })
}

/// `POST /api/orders` - place an order.
#[instrument(skip_all, fields(request_id = tracing::field::Empty, items = body.items.len()))]
pub async fn create_order(
    State(state): State<AppState>,
    OptionalPrincipal(principal): OptionalPrincipal,
    Json(body): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    body.validate()
        .map_err(|e| AppError::Invalid(e.to_string()))?;

    let items = body
        .items
        .into_iter()
        .map(parse_line_item)
        .collect::<Result<Vec<_>, _>>()?;

    let checkout = Checkout {
        items,
        shipping: parse_shipping(body.shipping)?,
        delivery_option: body.delivery_option,
        payment_method: body.payment_method,
        newsletter: body.newsletter,
        user: principal.map(|p| p.id),
    };

    let order = state.orders().place(checkout).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "orderId": order.id,
            "message": "Order created",
        })),
    ))
}

/// `GET /api/orders/me` - the authenticated user's orders, newest first.
#[instrument(skip_all, fields(request_id = tracing::field::Empty, user = %auth.0.id))]
pub async fn list_my_orders(
    State(state): State<AppState>,
    auth: RequireAuth,
) -> Result<Json<Vec<Order>>, AppError> {
    let orders = state.orders().list_for_user(&auth.0.id).await?;
    Ok(Json(orders))
}

/// `GET /api/orders` - recent orders across all users (admin only).
#[instrument(skip_all, fields(request_id = tracing::field::Empty))]
pub async fn list_orders(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> Result<Json<Vec<Order>>, AppError> {
    let orders = state.orders().list_recent().await?;
    Ok(Json(orders))
}

/// `PATCH /api/orders/{id}` - update an order's status (admin only).
///
/// The path segment is treated as an id candidate, not a strict id; noisy
/// encodings from admin tooling (quoted, URL-encoded, extended-JSON) are
/// resolved before lookup.
#[instrument(skip_all, fields(request_id = tracing::field::Empty, raw_id = %raw_id))]
pub async fn update_order_status(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(raw_id): Path<String>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let Some(status) = body.status else {
        return Err(AppError::Invalid("Missing status".to_owned()));
    };
    let status: OrderStatus = status
        .parse()
        .map_err(|e: velour_core::InvalidStatus| AppError::Invalid(e.to_string()))?;

    state.orders().update_status(&raw_id, status).await?;

    Ok(Json(json!({ "message": "Order updated" })))
}
