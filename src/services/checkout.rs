use crate::{
    cart::CartItem,
    errors::ServiceError,
    events::{Event, EventSender},
    payments::intent::{CheckoutIntent, IntentLineItem, ShippingAddress},
    payments::stripe::{CheckoutSessionParams, SessionLineItem, StripeClient},
};
use metrics::counter;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

/// Converts a major-unit price to integer minor units, rounding halves away
/// from zero the way storefront price displays do.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateCheckoutSessionRequest {
    /// Cart snapshot to charge for; prices are frozen as submitted.
    pub items: Vec<CartItem>,
    #[serde(rename = "customerEmail")]
    #[validate(email(message = "A valid customer email is required"))]
    pub customer_email: String,
    #[serde(rename = "shippingAddress")]
    #[validate]
    pub shipping_address: ShippingAddress,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckoutSessionResponse {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub url: Option<String>,
}

/// Settings the initiator needs from configuration.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub public_base_url: String,
    pub currency: String,
    pub shipping_fee_cents: i64,
}

/// Turns a cart snapshot plus shipping form into a hosted payment session,
/// embedding the order intent as gateway metadata.
#[derive(Clone)]
pub struct CheckoutService {
    gateway: Arc<StripeClient>,
    event_sender: Arc<EventSender>,
    settings: CheckoutSettings,
}

impl CheckoutService {
    pub fn new(
        gateway: Arc<StripeClient>,
        event_sender: Arc<EventSender>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            gateway,
            event_sender,
            settings,
        }
    }

    #[instrument(skip(self, request), fields(item_count = request.items.len()))]
    pub async fn create_session(
        &self,
        request: CreateCheckoutSessionRequest,
    ) -> Result<CheckoutSessionResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        if request.items.is_empty() {
            return Err(ServiceError::InvalidInput(
                "Cart must contain at least one item".to_string(),
            ));
        }

        let mut line_items = Vec::with_capacity(request.items.len());
        let mut intent_items = Vec::with_capacity(request.items.len());
        for item in &request.items {
            if item.quantity == 0 {
                return Err(ServiceError::InvalidInput(format!(
                    "Quantity for {} must be at least 1",
                    item.product.name
                )));
            }
            let unit_price = item.product.effective_price();
            if unit_price <= Decimal::ZERO {
                return Err(ServiceError::InvalidInput(format!(
                    "Price for {} must be greater than 0",
                    item.product.name
                )));
            }
            let unit_amount_minor = to_minor_units(unit_price).ok_or_else(|| {
                ServiceError::InvalidInput(format!(
                    "Price for {} is out of range",
                    item.product.name
                ))
            })?;

            line_items.push(SessionLineItem {
                name: item.product.name.clone(),
                description: item.product.description.clone(),
                image_url: item.product.image_url.clone(),
                unit_amount_minor,
                quantity: item.quantity,
            });
            intent_items.push(IntentLineItem {
                product_id: item.product.id,
                product_name: item.product.name.clone(),
                quantity: item.quantity,
                price: unit_price,
            });
        }

        let intent = CheckoutIntent::new(intent_items, Some(request.shipping_address));
        let metadata = intent
            .to_metadata()
            .map_err(|e| ServiceError::SerializationError(e.to_string()))?;

        let params = CheckoutSessionParams {
            line_items,
            customer_email: request.customer_email,
            success_url: format!(
                "{}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}",
                self.settings.public_base_url
            ),
            cancel_url: format!("{}/checkout/cancel", self.settings.public_base_url),
            currency: self.settings.currency.clone(),
            shipping_fee_minor: self.settings.shipping_fee_cents,
            collect_phone_number: true,
            metadata,
        };

        let session = self.gateway.create_checkout_session(&params).await?;

        info!(session_id = %session.id, "Checkout session created");
        counter!("checkout.sessions.created", 1);
        self.event_sender
            .send_or_log(Event::CheckoutSessionCreated {
                session_id: session.id.clone(),
                item_count: request.items.len(),
            })
            .await;

        Ok(CheckoutSessionResponse {
            session_id: session.id,
            url: session.url,
        })
    }
}
