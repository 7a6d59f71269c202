//! Integration test harness for Velour.
//!
//! Tests exercise the storefront router in-process against the in-memory
//! store, so no external MongoDB or SMTP relay is required. Requests are
//! driven through `tower::ServiceExt::oneshot`.
//!
//! Run with: `cargo test -p velour-integration-tests`

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::missing_panics_doc)]

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;

use velour_core::{Email, ProductId, Role, UserId};
use velour_storefront::config::{AppConfig, StoreBackend};
use velour_storefront::db::{MemoryStore, ProductRecord, UserRecord};
use velour_storefront::middleware::auth::sign_token;
use velour_storefront::services::Mailer;
use velour_storefront::state::AppState;

/// A storefront app wired to an in-memory store, plus handles for seeding
/// and inspecting it.
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub app: Router,
    jwt_secret: String,
}

impl TestContext {
    /// Build a context. `transactional` selects the atomic or the
    /// compensating placement path.
    #[must_use]
    pub fn new(transactional: bool) -> Self {
        let jwt_secret = "wJq8xZr2mN5vK7pT4cB9dF1gH6sL3aE0".to_owned();
        let config = AppConfig {
            store_backend: StoreBackend::Memory,
            mongodb_uri: SecretString::from(String::new()),
            mongodb_database: "velour_test".to_owned(),
            mongodb_transactions: None,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            jwt_secret: SecretString::from(jwt_secret.clone()),
            admin_email: "orders@velour.test".to_owned(),
            smtp: None,
            sentry_dsn: None,
            sentry_environment: None,
        };

        let store = Arc::new(MemoryStore::new(transactional));
        let state = AppState::new(config, store.clone(), Mailer::disabled());
        let app = velour_storefront::app(state);

        Self {
            store,
            app,
            jwt_secret,
        }
    }

    /// Seed a product and return its id.
    pub fn seed_product(&self, hex: &str, name: &str, price: i64, quantity: i64) -> ProductId {
        let id = ProductId::parse(hex).expect("test product id");
        self.store.seed_product(ProductRecord {
            id: id.clone(),
            name: name.to_owned(),
            price: Decimal::new(price, 0),
            quantity,
        });
        id
    }

    /// Seed a user and return its id.
    pub fn seed_user(&self, hex: &str, role: Role) -> UserId {
        let id = UserId::parse(hex).expect("test user id");
        self.store.seed_user(UserRecord {
            id: id.clone(),
            name: "Test User".to_owned(),
            email: Email::parse("user@velour.test").expect("test email"),
            role,
            newsletter: false,
            orders: Vec::new(),
        });
        id
    }

    /// Sign a token for a principal, as the external auth provider would.
    #[must_use]
    pub fn token_for(&self, user: &UserId, role: Role) -> String {
        sign_token(user, role, self.jwt_secret.as_bytes()).expect("token signing")
    }

    /// Send one request through a clone of the router.
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app
            .clone()
            .oneshot(request)
            .await
            .expect("router never errors")
    }

    /// POST a JSON body, optionally with a bearer token.
    pub async fn post_json(
        &self,
        uri: &str,
        body: &Value,
        token: Option<&str>,
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = builder
            .body(Body::from(body.to_string()))
            .expect("request build");
        self.send(request).await
    }

    /// PATCH a JSON body, optionally with a bearer token.
    pub async fn patch_json(
        &self,
        uri: &str,
        body: &Value,
        token: Option<&str>,
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method("PATCH")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = builder
            .body(Body::from(body.to_string()))
            .expect("request build");
        self.send(request).await
    }

    /// GET, optionally with a bearer token.
    pub async fn get(&self, uri: &str, token: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty()).expect("request build");
        self.send(request).await
    }
}

/// Read a response body as JSON, asserting the expected status first.
pub async fn json_body(response: Response<Body>, expected: StatusCode) -> Value {
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collect")
        .to_bytes();
    assert_eq!(
        status,
        expected,
        "unexpected status, body: {}",
        String::from_utf8_lossy(&bytes)
    );
    serde_json::from_slice(&bytes).expect("JSON body")
}
