pub mod carts;
pub mod checkout;
pub mod common;
pub mod customers;
pub mod orders;
pub mod products;
pub mod webhooks;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::ApiError;
use crate::events::EventSender;
use crate::payments::signature::{constant_time_eq, WebhookVerifier};
use crate::payments::stripe::StripeClient;
use crate::services::catalog::ProductService;
use crate::services::checkout::{CheckoutService, CheckoutSettings};
use crate::services::customers::{AuthDirectory, CustomerService, HostedAuthDirectory};
use crate::services::orders::OrderService;
use crate::services::webhooks::WebhookService;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub products: Arc<ProductService>,
    pub customers: Arc<CustomerService>,
    pub orders: Arc<OrderService>,
    pub checkout: Arc<CheckoutService>,
    pub webhooks: Arc<WebhookService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, config: &AppConfig) -> Self {
        let gateway = Arc::new(StripeClient::new(
            config.stripe_secret_key.clone(),
            config.stripe_api_base.clone(),
        ));

        let directory: Option<Arc<dyn AuthDirectory>> =
            match (&config.auth_admin_url, &config.auth_service_key) {
                (Some(url), Some(key)) => {
                    Some(Arc::new(HostedAuthDirectory::new(url.clone(), key.clone())))
                }
                _ => None,
            };

        let products = Arc::new(ProductService::new(db_pool.clone(), event_sender.clone()));
        let customers = Arc::new(CustomerService::new(db_pool.clone(), event_sender.clone()));
        let orders = Arc::new(OrderService::new(db_pool, event_sender.clone()));
        let checkout = Arc::new(CheckoutService::new(
            gateway,
            event_sender,
            CheckoutSettings {
                public_base_url: config.public_base_url.clone(),
                currency: config.currency.clone(),
                shipping_fee_cents: config.shipping_fee_cents,
            },
        ));

        // An unset webhook secret leaves an empty-key verifier, which
        // rejects every delivery instead of accepting unsigned ones.
        let verifier = WebhookVerifier::new(
            config.stripe_webhook_secret.clone().unwrap_or_default(),
            config.stripe_webhook_tolerance_secs,
        );
        let webhooks = Arc::new(WebhookService::new(
            verifier,
            orders.clone(),
            customers.clone(),
            directory,
        ));

        Self {
            products,
            customers,
            orders,
            checkout,
            webhooks,
        }
    }
}

/// Gate for the admin surface: requires `Authorization: Bearer <token>`
/// matching the configured admin token. With no token configured the
/// admin routes are disabled outright.
pub async fn require_admin_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.config.admin_api_token.as_deref() else {
        return Err(ApiError::Unauthorized(
            "Admin API is not enabled".to_string(),
        ));
    };

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match provided {
        Some(token) if constant_time_eq(token, expected) => Ok(next.run(request).await),
        _ => Err(ApiError::Unauthorized("Invalid admin token".to_string())),
    }
}
