//! Storefront API library.
//!
//! Product catalog, session carts, checkout through a hosted payment
//! gateway, and webhook-driven order fulfillment.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod cart;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod openapi;
pub mod payments;
pub mod services;

use axum::{extract::State, middleware, response::Json, routing::get, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::cart::CartSessions;
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::handlers::AppServices;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: Arc<AppConfig>,
    pub event_sender: Arc<EventSender>,
    pub services: AppServices,
    pub carts: Arc<CartSessions>,
}

impl AppState {
    pub fn new(db: Arc<DbPool>, config: Arc<AppConfig>, event_sender: Arc<EventSender>) -> Self {
        let services = AppServices::new(db.clone(), event_sender.clone(), &config);
        Self {
            db,
            config,
            event_sender,
            services,
            carts: Arc::new(CartSessions::new()),
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// All `/api/v1` routes. Admin mutations sit behind the bearer-token gate;
/// everything else is public storefront surface.
pub fn api_v1_routes(state: AppState) -> Router<AppState> {
    let product_admin = handlers::products::product_admin_routes().route_layer(
        middleware::from_fn_with_state(state.clone(), handlers::require_admin_token),
    );
    let order_admin = handlers::orders::order_admin_routes().route_layer(
        middleware::from_fn_with_state(state.clone(), handlers::require_admin_token),
    );
    let customer_admin = handlers::customers::customer_admin_routes().route_layer(
        middleware::from_fn_with_state(state, handlers::require_admin_token),
    );

    Router::new()
        // Status and health endpoints
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        // Catalog (public reads merged with gated mutations)
        .nest(
            "/products",
            handlers::products::product_routes().merge(product_admin),
        )
        // Session carts
        .nest("/carts", handlers::carts::cart_routes())
        // Hosted checkout
        .nest("/checkout", handlers::checkout::checkout_routes())
        // Order history
        .nest("/orders", handlers::orders::order_routes())
        .nest("/admin/orders", order_admin)
        // Auth-provider shadow identities
        .nest("/customers", customer_admin)
        // Payment gateway callbacks (signature-verified, not token-gated)
        .nest("/webhooks", handlers::webhooks::webhook_routes())
}

/// Full application router: the v1 API plus the Swagger UI.
pub fn app_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(|| async { "storefront-api up" }))
        .nest("/api/v1", api_v1_routes(state))
        .merge(openapi::swagger_ui())
}

async fn api_status(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let version = env!("CARGO_PKG_VERSION");
    let git = option_env!("GIT_HASH").unwrap_or("unknown");
    let status_data = json!({
        "status": "ok",
        "version": version,
        "git": git,
        "service": "storefront-api",
        "environment": state.config.environment,
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}
