use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use tracing::{instrument, warn};

use crate::errors::ServiceError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const SHIPPING_DISPLAY_NAME: &str = "Standard Shipping";
const DELIVERY_ESTIMATE_MIN_DAYS: u32 = 5;
const DELIVERY_ESTIMATE_MAX_DAYS: u32 = 7;

/// Thin client for the hosted-payment gateway. Only the session-creation
/// endpoint is wrapped; confirmation arrives out of band via webhook.
#[derive(Debug, Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

/// One displayable purchase line sent to the gateway.
#[derive(Debug, Clone)]
pub struct SessionLineItem {
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    /// Unit price in minor currency units, already rounded.
    pub unit_amount_minor: i64,
    pub quantity: u32,
}

/// Everything needed to open a hosted checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutSessionParams {
    pub line_items: Vec<SessionLineItem>,
    pub customer_email: String,
    pub success_url: String,
    pub cancel_url: String,
    pub currency: String,
    /// Flat shipping fee in minor units, attached as a fixed-amount rate.
    pub shipping_fee_minor: i64,
    pub collect_phone_number: bool,
    pub metadata: HashMap<String, String>,
}

impl CheckoutSessionParams {
    /// Serializes to the gateway's bracket-notation form encoding. Metadata
    /// keys are sorted so the output is stable.
    pub fn to_form(&self) -> Vec<(String, String)> {
        let mut form: Vec<(String, String)> = Vec::new();
        form.push(("mode".into(), "payment".into()));
        form.push(("payment_method_types[0]".into(), "card".into()));
        form.push(("success_url".into(), self.success_url.clone()));
        form.push(("cancel_url".into(), self.cancel_url.clone()));
        form.push(("customer_email".into(), self.customer_email.clone()));

        for (i, item) in self.line_items.iter().enumerate() {
            let prefix = format!("line_items[{i}]");
            form.push((
                format!("{prefix}[price_data][currency]"),
                self.currency.clone(),
            ));
            form.push((
                format!("{prefix}[price_data][product_data][name]"),
                item.name.clone(),
            ));
            if let Some(description) = &item.description {
                form.push((
                    format!("{prefix}[price_data][product_data][description]"),
                    description.clone(),
                ));
            }
            if let Some(image_url) = &item.image_url {
                form.push((
                    format!("{prefix}[price_data][product_data][images][0]"),
                    image_url.clone(),
                ));
            }
            form.push((
                format!("{prefix}[price_data][unit_amount]"),
                item.unit_amount_minor.to_string(),
            ));
            form.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
        }

        let rate = "shipping_options[0][shipping_rate_data]";
        form.push((format!("{rate}[type]"), "fixed_amount".into()));
        form.push((
            format!("{rate}[fixed_amount][amount]"),
            self.shipping_fee_minor.to_string(),
        ));
        form.push((format!("{rate}[fixed_amount][currency]"), self.currency.clone()));
        form.push((format!("{rate}[display_name]"), SHIPPING_DISPLAY_NAME.into()));
        form.push((
            format!("{rate}[delivery_estimate][minimum][unit]"),
            "business_day".into(),
        ));
        form.push((
            format!("{rate}[delivery_estimate][minimum][value]"),
            DELIVERY_ESTIMATE_MIN_DAYS.to_string(),
        ));
        form.push((
            format!("{rate}[delivery_estimate][maximum][unit]"),
            "business_day".into(),
        ));
        form.push((
            format!("{rate}[delivery_estimate][maximum][value]"),
            DELIVERY_ESTIMATE_MAX_DAYS.to_string(),
        ));

        if self.collect_phone_number {
            form.push(("phone_number_collection[enabled]".into(), "true".into()));
        }

        let mut keys: Vec<&String> = self.metadata.keys().collect();
        keys.sort();
        for key in keys {
            if let Some(value) = self.metadata.get(key) {
                form.push((format!("metadata[{key}]"), value.clone()));
            }
        }

        form
    }
}

/// The fields of the gateway's session object the caller needs back.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    error: GatewayErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorDetail {
    message: Option<String>,
}

impl StripeClient {
    pub fn new(secret_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), secret_key, api_base)
    }

    pub fn with_client(
        client: reqwest::Client,
        secret_key: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        }
    }

    #[instrument(skip(self, params), fields(line_items = params.line_items.len()))]
    pub async fn create_checkout_session(
        &self,
        params: &CheckoutSessionParams,
    ) -> Result<CheckoutSession, ServiceError> {
        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&params.to_form())
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                ServiceError::ExternalServiceError(format!("payment gateway unreachable: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GatewayErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or_else(|| format!("gateway returned status {}", status));
            warn!(%status, "payment gateway rejected checkout session request");
            return Err(ServiceError::PaymentFailed(message));
        }

        response.json::<CheckoutSession>().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!(
                "payment gateway returned an unreadable session: {}",
                e
            ))
        })
    }
}
