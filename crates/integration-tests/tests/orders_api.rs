//! End-to-end tests for the order API.
//!
//! The router runs in-process against the in-memory store; both the atomic
//! and the compensating placement paths are covered by flipping the store's
//! transaction capability.

use axum::http::StatusCode;
use serde_json::{Value, json};

use velour_core::Role;
use velour_integration_tests::{TestContext, json_body};

const PRODUCT_A: &str = "64b1f0a2c3d4e5f601000001";
const PRODUCT_B: &str = "64b1f0a2c3d4e5f601000002";
const USER_ID: &str = "64b1f0a2c3d4e5f601000099";
const ADMIN_ID: &str = "64b1f0a2c3d4e5f601000098";

fn checkout_body(product_id: &str, qty: i64) -> Value {
    json!({
        "items": [{
            "productId": product_id,
            "name": "Velour Hoodie",
            "price": "100",
            "qty": qty,
        }],
        "shipping": {
            "firstName": "Ada",
            "lastName": "Stone",
            "email": "ada@example.com",
            "address": "1 Mill Lane",
            "city": "Lahore",
            "postal": "54000",
            "phone": "+92 300 0000000",
            "country": "PK",
        },
    })
}

#[tokio::test]
async fn test_guest_checkout_creates_order_and_decrements_stock() {
    let ctx = TestContext::new(true);
    let product = ctx.seed_product(PRODUCT_A, "Velour Hoodie", 100, 5);

    let response = ctx
        .post_json("/api/orders", &checkout_body(PRODUCT_A, 2), None)
        .await;
    let body = json_body(response, StatusCode::CREATED).await;

    assert_eq!(body["message"], "Order created");
    let order_id = body["orderId"].as_str().expect("orderId in response");
    assert_eq!(order_id.len(), 24);

    assert_eq!(ctx.store.product_quantity(&product), Some(3));
    assert_eq!(ctx.store.order_count(), 1);
}

#[tokio::test]
async fn test_concurrent_checkouts_cannot_oversell() {
    let ctx = TestContext::new(true);
    let product = ctx.seed_product(PRODUCT_A, "Velour Hoodie", 100, 1);

    let body = checkout_body(PRODUCT_A, 1);
    let (first, second) = tokio::join!(
        ctx.post_json("/api/orders", &body, None),
        ctx.post_json("/api/orders", &body, None),
    );

    let mut statuses = [first.status(), second.status()];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::CREATED, StatusCode::BAD_REQUEST]);

    assert_eq!(ctx.store.product_quantity(&product), Some(0));
    assert_eq!(ctx.store.order_count(), 1);
}

#[tokio::test]
async fn test_insufficient_stock_names_the_item() {
    let ctx = TestContext::new(true);
    ctx.seed_product(PRODUCT_A, "Velour Hoodie", 100, 1);

    let response = ctx
        .post_json("/api/orders", &checkout_body(PRODUCT_A, 3), None)
        .await;
    let body = json_body(response, StatusCode::BAD_REQUEST).await;

    let message = body["error"].as_str().expect("error message");
    assert!(message.contains("Velour Hoodie"), "got: {message}");
}

#[tokio::test]
async fn test_atomic_failure_restores_stock_across_items() {
    let ctx = TestContext::new(true);
    let hoodie = ctx.seed_product(PRODUCT_A, "Velour Hoodie", 100, 5);
    let scarf = ctx.seed_product(PRODUCT_B, "Velour Scarf", 50, 0);

    let body = json!({
        "items": [
            {"productId": PRODUCT_A, "name": "Velour Hoodie", "price": "100", "qty": 1},
            {"productId": PRODUCT_B, "name": "Velour Scarf", "price": "50", "qty": 1},
        ],
        "shipping": checkout_body(PRODUCT_A, 1)["shipping"],
    });

    let response = ctx.post_json("/api/orders", &body, None).await;
    json_body(response, StatusCode::BAD_REQUEST).await;

    assert_eq!(ctx.store.product_quantity(&hoodie), Some(5));
    assert_eq!(ctx.store.product_quantity(&scarf), Some(0));
    assert_eq!(ctx.store.order_count(), 0);
}

#[tokio::test]
async fn test_compensating_path_also_prevents_oversell() {
    let ctx = TestContext::new(false);
    let product = ctx.seed_product(PRODUCT_A, "Velour Hoodie", 100, 1);

    let body = checkout_body(PRODUCT_A, 1);
    let first = ctx.post_json("/api/orders", &body, None).await;
    let second = ctx.post_json("/api/orders", &body, None).await;

    assert_eq!(first.status(), StatusCode::CREATED);
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    assert_eq!(ctx.store.product_quantity(&product), Some(0));
}

#[tokio::test]
async fn test_empty_cart_is_rejected_before_any_mutation() {
    let ctx = TestContext::new(true);
    let product = ctx.seed_product(PRODUCT_A, "Velour Hoodie", 100, 5);

    let mut body = checkout_body(PRODUCT_A, 1);
    body["items"] = json!([]);

    let response = ctx.post_json("/api/orders", &body, None).await;
    json_body(response, StatusCode::BAD_REQUEST).await;

    assert_eq!(ctx.store.product_quantity(&product), Some(5));
    assert_eq!(ctx.store.order_count(), 0);
}

#[tokio::test]
async fn test_invalid_shipping_email_is_rejected() {
    let ctx = TestContext::new(true);
    ctx.seed_product(PRODUCT_A, "Velour Hoodie", 100, 5);

    let mut body = checkout_body(PRODUCT_A, 1);
    body["shipping"]["email"] = json!("not-an-email");

    let response = ctx.post_json("/api/orders", &body, None).await;
    json_body(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(ctx.store.order_count(), 0);
}

#[tokio::test]
async fn test_authenticated_checkout_links_order_to_user() {
    let ctx = TestContext::new(true);
    ctx.seed_product(PRODUCT_A, "Velour Hoodie", 100, 5);
    let user = ctx.seed_user(USER_ID, Role::User);
    let token = ctx.token_for(&user, Role::User);

    let response = ctx
        .post_json("/api/orders", &checkout_body(PRODUCT_A, 1), Some(&token))
        .await;
    let body = json_body(response, StatusCode::CREATED).await;
    let order_id = body["orderId"].as_str().expect("orderId");

    let linked = ctx.store.user_orders(&user);
    assert_eq!(linked.len(), 1);
    assert_eq!(linked[0].as_str(), order_id);

    let response = ctx.get("/api/orders/me", Some(&token)).await;
    let orders = json_body(response, StatusCode::OK).await;
    assert_eq!(orders.as_array().map(Vec::len), Some(1));
    assert_eq!(orders[0]["id"], order_id);
    assert_eq!(orders[0]["status"], "pending");
    // Totals are computed server-side: 100 + flat 200 shipping
    assert_eq!(orders[0]["total"], "300");
}

#[tokio::test]
async fn test_my_orders_requires_authentication() {
    let ctx = TestContext::new(true);

    let response = ctx.get("/api/orders/me", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = ctx.get("/api/orders/me", Some("garbage-token")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_order_listing_is_admin_only() {
    let ctx = TestContext::new(true);
    let user = ctx.seed_user(USER_ID, Role::User);
    let admin = ctx.seed_user(ADMIN_ID, Role::Admin);

    let response = ctx.get("/api/orders", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let user_token = ctx.token_for(&user, Role::User);
    let response = ctx.get("/api/orders", Some(&user_token)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let admin_token = ctx.token_for(&admin, Role::Admin);
    let response = ctx.get("/api/orders", Some(&admin_token)).await;
    let orders = json_body(response, StatusCode::OK).await;
    assert_eq!(orders.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn test_status_update_accepts_noisy_id_encodings() {
    let ctx = TestContext::new(true);
    ctx.seed_product(PRODUCT_A, "Velour Hoodie", 100, 5);
    let admin = ctx.seed_user(ADMIN_ID, Role::Admin);
    let admin_token = ctx.token_for(&admin, Role::Admin);

    let response = ctx
        .post_json("/api/orders", &checkout_body(PRODUCT_A, 1), None)
        .await;
    let body = json_body(response, StatusCode::CREATED).await;
    let order_id = body["orderId"].as_str().expect("orderId").to_owned();

    // Extended-JSON id as copied out of a database shell, percent-encoded
    // for the path segment.
    let noisy = urlencoding::encode(&format!("{{\"$oid\":\"{order_id}\"}}")).into_owned();
    let response = ctx
        .patch_json(
            &format!("/api/orders/{noisy}"),
            &json!({"status": "paid"}),
            Some(&admin_token),
        )
        .await;
    let body = json_body(response, StatusCode::OK).await;
    assert_eq!(body["message"], "Order updated");

    // Quoted id; quotes are stripped by hex filtering.
    let quoted = urlencoding::encode(&format!("\"{order_id}\"")).into_owned();
    let response = ctx
        .patch_json(
            &format!("/api/orders/{quoted}"),
            &json!({"status": "shipped"}),
            Some(&admin_token),
        )
        .await;
    json_body(response, StatusCode::OK).await;
}

#[tokio::test]
async fn test_cancellation_restocks_products() {
    let ctx = TestContext::new(true);
    let product = ctx.seed_product(PRODUCT_A, "Velour Hoodie", 100, 5);
    let admin = ctx.seed_user(ADMIN_ID, Role::Admin);
    let admin_token = ctx.token_for(&admin, Role::Admin);

    let response = ctx
        .post_json("/api/orders", &checkout_body(PRODUCT_A, 2), None)
        .await;
    let body = json_body(response, StatusCode::CREATED).await;
    let order_id = body["orderId"].as_str().expect("orderId").to_owned();
    assert_eq!(ctx.store.product_quantity(&product), Some(3));

    let response = ctx
        .patch_json(
            &format!("/api/orders/{order_id}"),
            &json!({"status": "cancelled"}),
            Some(&admin_token),
        )
        .await;
    json_body(response, StatusCode::OK).await;
    assert_eq!(ctx.store.product_quantity(&product), Some(5));

    // Cancelling again must not restock twice.
    let response = ctx
        .patch_json(
            &format!("/api/orders/{order_id}"),
            &json!({"status": "cancelled"}),
            Some(&admin_token),
        )
        .await;
    json_body(response, StatusCode::OK).await;
    assert_eq!(ctx.store.product_quantity(&product), Some(5));
}

#[tokio::test]
async fn test_status_update_rejects_bad_requests() {
    let ctx = TestContext::new(true);
    let admin = ctx.seed_user(ADMIN_ID, Role::Admin);
    let admin_token = ctx.token_for(&admin, Role::Admin);
    let user = ctx.seed_user(USER_ID, Role::User);
    let user_token = ctx.token_for(&user, Role::User);
    let missing = "64b1f0a2c3d4e5f601000042";

    // Non-admin principals may not touch statuses.
    let response = ctx
        .patch_json(
            &format!("/api/orders/{missing}"),
            &json!({"status": "paid"}),
            Some(&user_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Missing status field.
    let response = ctx
        .patch_json(
            &format!("/api/orders/{missing}"),
            &json!({}),
            Some(&admin_token),
        )
        .await;
    let body = json_body(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["error"], "Missing status");

    // Unknown status value.
    let response = ctx
        .patch_json(
            &format!("/api/orders/{missing}"),
            &json!({"status": "teleported"}),
            Some(&admin_token),
        )
        .await;
    json_body(response, StatusCode::BAD_REQUEST).await;

    // Well-formed id with no matching order.
    let response = ctx
        .patch_json(
            &format!("/api/orders/{missing}"),
            &json!({"status": "paid"}),
            Some(&admin_token),
        )
        .await;
    json_body(response, StatusCode::NOT_FOUND).await;
}

#[tokio::test]
async fn test_health_endpoints() {
    let ctx = TestContext::new(true);

    let response = ctx.get("/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = ctx.get("/health/ready", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}
