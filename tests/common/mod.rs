use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use storefront_api::{
    config::AppConfig,
    db,
    events::{self, EventSender},
    payments::signature::signature_header,
    services::catalog::{CreateProductRequest, ProductResponse},
    AppState,
};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;

pub const TEST_ADMIN_TOKEN: &str = "test-admin-token";
pub const TEST_WEBHOOK_SECRET: &str = "whsec_integration_secret";

/// Test harness: the full application router backed by a throwaway SQLite
/// database, exercised in-process through `tower::ServiceExt::oneshot`.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
    _db_dir: TempDir,
}

impl TestApp {
    /// Construct a test application with default test configuration.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Construct a test application, letting the caller adjust the config
    /// first (point the gateway at a mock server, set directory URLs, ...).
    pub async fn with_config(customize: impl FnOnce(&mut AppConfig)) -> Self {
        let db_dir = TempDir::new().expect("create temp dir for test database");
        let db_path = db_dir.path().join("storefront_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.admin_api_token = Some(TEST_ADMIN_TOKEN.to_string());
        cfg.stripe_webhook_secret = Some(TEST_WEBHOOK_SECRET.to_string());
        cfg.stripe_secret_key = "sk_test_integration".to_string();
        customize(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::new(db_arc, Arc::new(cfg), event_sender);
        let router = storefront_api::app_router(state.clone()).with_state(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
            _db_dir: db_dir,
        }
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Convenience helper for admin requests with the configured token.
    #[allow(dead_code)]
    pub async fn admin_request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.request(method, uri, body, Some(TEST_ADMIN_TOKEN)).await
    }

    /// Deliver a gateway webhook, optionally with a signature header.
    #[allow(dead_code)]
    pub async fn post_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/webhooks/stripe")
            .header("content-type", "application/json");

        if let Some(sig) = signature {
            builder = builder.header("stripe-signature", sig);
        }

        let request = builder
            .body(Body::from(payload.to_vec()))
            .expect("failed to build webhook request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during webhook request")
    }

    /// Deliver a gateway webhook signed with the test secret.
    #[allow(dead_code)]
    pub async fn post_signed_webhook(&self, payload: &[u8]) -> axum::response::Response {
        let header = signature_header(TEST_WEBHOOK_SECRET, Utc::now().timestamp(), payload);
        self.post_webhook(payload, Some(&header)).await
    }

    /// Insert a catalog product through the service layer.
    #[allow(dead_code)]
    pub async fn seed_product(
        &self,
        name: &str,
        price: Decimal,
        sale_price: Option<Decimal>,
        stock: i32,
    ) -> ProductResponse {
        self.state
            .services
            .products
            .create_product(CreateProductRequest {
                name: name.to_string(),
                description: Some(format!("{} seeded for integration tests", name)),
                price,
                sale_price,
                image_url: None,
                category: Some("apparel".to_string()),
                stock,
                is_featured: false,
            })
            .await
            .expect("seed product for tests")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// Parses a JSON decimal-string field; comparisons stay scale-agnostic.
#[allow(dead_code)]
pub fn decimal(value: &Value) -> Decimal {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| panic!("not a decimal string: {value}"))
}

/// Read a JSON body out of a response.
pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// A `checkout.session.completed` event carrying the metadata the checkout
/// initiator writes, shaped like the gateway's delivery payload.
#[allow(dead_code)]
pub fn completed_checkout_event(
    session_id: &str,
    payment_intent: &str,
    amount_total: i64,
    customer_email: &str,
    items: Value,
    shipping_address: Option<Value>,
) -> Vec<u8> {
    // Metadata values are strings: the address is JSON text, or empty when
    // the session carried none.
    let shipping = shipping_address.map(|v| v.to_string()).unwrap_or_default();
    let event = json!({
        "id": format!("evt_{}", session_id),
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": session_id,
                "payment_intent": payment_intent,
                "amount_total": amount_total,
                "currency": "usd",
                "customer_email": customer_email,
                "metadata": {
                    "orderItems": items.to_string(),
                    "shippingAddress": shipping,
                    "schemaVersion": "1",
                }
            }
        }
    });
    serde_json::to_vec(&event).expect("serialize webhook event")
}
