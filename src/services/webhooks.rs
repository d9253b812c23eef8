use crate::{
    errors::ServiceError,
    payments::event::{CheckoutSessionObject, GatewayEvent, GatewayEventKind},
    payments::intent::CheckoutIntent,
    payments::signature::{SignatureError, WebhookVerifier},
    services::customers::{AuthDirectory, CustomerService},
    services::orders::{NewOrderItem, NewPaidOrder, OrderService, PaidOrderOutcome},
};
use metrics::counter;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Fallback stored on the order when neither the intent metadata nor the
/// gateway event carried an address.
const NO_SHIPPING_ADDRESS: &str = "No shipping address provided";

/// What a verified delivery did.
#[derive(Debug)]
pub enum WebhookOutcome {
    /// Event kind this service does not act on; acknowledged as received.
    Ignored(GatewayEventKind),
    OrderCreated(Uuid),
    DuplicateDelivery(Uuid),
}

/// Consumes signed gateway events and materializes paid checkouts into
/// orders. Verification always runs before the payload is inspected.
#[derive(Clone)]
pub struct WebhookService {
    verifier: WebhookVerifier,
    orders: Arc<OrderService>,
    customers: Arc<CustomerService>,
    directory: Option<Arc<dyn AuthDirectory>>,
}

impl WebhookService {
    pub fn new(
        verifier: WebhookVerifier,
        orders: Arc<OrderService>,
        customers: Arc<CustomerService>,
        directory: Option<Arc<dyn AuthDirectory>>,
    ) -> Self {
        Self {
            verifier,
            orders,
            customers,
            directory,
        }
    }

    #[instrument(skip(self, signature, payload), fields(payload_len = payload.len()))]
    pub async fn handle_delivery(
        &self,
        signature: Option<&str>,
        payload: &[u8],
    ) -> Result<WebhookOutcome, ServiceError> {
        self.verifier
            .verify(signature, payload)
            .map_err(|e| {
                counter!("webhooks.signature_failures", 1);
                match e {
                    SignatureError::MissingHeader | SignatureError::Malformed => {
                        ServiceError::BadRequest(e.to_string())
                    }
                    SignatureError::StaleTimestamp | SignatureError::Mismatch => {
                        ServiceError::Unauthorized("Invalid signature".to_string())
                    }
                }
            })?;

        let event = GatewayEvent::parse(payload).map_err(|e| {
            warn!(error = %e, "Webhook payload is not a valid event envelope");
            ServiceError::BadRequest("Webhook payload is not valid JSON".to_string())
        })?;

        if event.kind != GatewayEventKind::CheckoutSessionCompleted {
            info!(kind = event.kind.as_str(), "Ignoring unhandled event kind");
            counter!("webhooks.deliveries.ignored", 1);
            return Ok(WebhookOutcome::Ignored(event.kind));
        }

        let session = event.checkout_session().map_err(|e| {
            warn!(error = %e, "Completed-checkout event carried a malformed session object");
            ServiceError::BadRequest("Checkout session object is malformed".to_string())
        })?;

        let outcome = self.record_completed_session(&session).await?;
        match &outcome {
            WebhookOutcome::OrderCreated(order_id) => {
                counter!("webhooks.orders.created", 1);
                info!(order_id = %order_id, "Order created successfully");
            }
            WebhookOutcome::DuplicateDelivery(order_id) => {
                counter!("webhooks.deliveries.duplicate", 1);
                info!(order_id = %order_id, "Duplicate delivery ignored");
            }
            WebhookOutcome::Ignored(_) => {}
        }
        Ok(outcome)
    }

    async fn record_completed_session(
        &self,
        session: &CheckoutSessionObject,
    ) -> Result<WebhookOutcome, ServiceError> {
        let intent = CheckoutIntent::from_metadata(&session.metadata).map_err(|e| {
            warn!(error = %e, session_id = %session.id, "No usable order items in metadata");
            ServiceError::BadRequest(e.to_string())
        })?;

        let email = session.email().ok_or_else(|| {
            warn!(session_id = %session.id, "No customer email found");
            ServiceError::BadRequest("No customer email found".to_string())
        })?;

        let payment_intent_id = session.payment_intent.clone().ok_or_else(|| {
            warn!(session_id = %session.id, "Completed session has no payment reference");
            ServiceError::BadRequest("Checkout session has no payment reference".to_string())
        })?;

        let amount_total = session.amount_total.ok_or_else(|| {
            warn!(session_id = %session.id, "Completed session has no settled amount");
            ServiceError::BadRequest("Checkout session has no settled amount".to_string())
        })?;
        let total = Decimal::new(amount_total, 2);

        let customer_id = self.resolve_purchaser(email).await?;
        if customer_id.is_none() {
            warn!(session_id = %session.id, "Could not find user for purchaser email");
            counter!("webhooks.orders.unresolved_purchaser", 1);
        }

        let shipping_address = intent
            .shipping_address
            .as_ref()
            .map(|addr| addr.flatten())
            .or_else(|| {
                session
                    .shipping_details
                    .as_ref()
                    .and_then(|details| details.flatten())
            })
            .unwrap_or_else(|| NO_SHIPPING_ADDRESS.to_string());

        let mut items = Vec::with_capacity(intent.items.len());
        for line in &intent.items {
            let quantity = i32::try_from(line.quantity).map_err(|_| {
                ServiceError::BadRequest(format!(
                    "Quantity for {} is out of range",
                    line.product_name
                ))
            })?;
            items.push(NewOrderItem {
                product_id: line.product_id,
                quantity,
                price: line.price,
            });
        }

        let outcome = self
            .orders
            .record_paid_checkout(NewPaidOrder {
                customer_id,
                total,
                shipping_address,
                payment_intent_id,
                items,
            })
            .await?;

        Ok(match outcome {
            PaidOrderOutcome::Created(order) => WebhookOutcome::OrderCreated(order.id),
            PaidOrderOutcome::AlreadyRecorded(order) => WebhookOutcome::DuplicateDelivery(order.id),
        })
    }

    /// Local customer row first, then the auth directory. A directory
    /// failure degrades to an unattributed order rather than losing the
    /// payment event.
    async fn resolve_purchaser(&self, email: &str) -> Result<Option<Uuid>, ServiceError> {
        if let Some(customer) = self.customers.find_by_email(email).await? {
            return Ok(Some(customer.id));
        }

        let Some(directory) = &self.directory else {
            return Ok(None);
        };

        match directory.find_user_id_by_email(email).await {
            Ok(Some(user_id)) => {
                let customer = self
                    .customers
                    .ensure_customer(user_id, email, None)
                    .await?;
                Ok(Some(customer.id))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                warn!(error = %e, "Auth directory lookup failed, recording order without purchaser");
                Ok(None)
            }
        }
    }
}
