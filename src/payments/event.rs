use std::collections::HashMap;

use serde::Deserialize;

/// Event kinds the gateway delivers. Only `CheckoutSessionCompleted` drives
/// order creation; everything else is acknowledged and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum GatewayEventKind {
    #[serde(rename = "checkout.session.completed")]
    CheckoutSessionCompleted,
    #[serde(rename = "checkout.session.expired")]
    CheckoutSessionExpired,
    #[serde(rename = "payment_intent.succeeded")]
    PaymentIntentSucceeded,
    #[serde(rename = "payment_intent.payment_failed")]
    PaymentIntentFailed,
    #[serde(rename = "charge.refunded")]
    ChargeRefunded,
    #[serde(other)]
    Other,
}

impl GatewayEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayEventKind::CheckoutSessionCompleted => "checkout.session.completed",
            GatewayEventKind::CheckoutSessionExpired => "checkout.session.expired",
            GatewayEventKind::PaymentIntentSucceeded => "payment_intent.succeeded",
            GatewayEventKind::PaymentIntentFailed => "payment_intent.payment_failed",
            GatewayEventKind::ChargeRefunded => "charge.refunded",
            GatewayEventKind::Other => "other",
        }
    }
}

/// Signed event envelope. `data.object` stays untyped until the kind has
/// been checked, so unrelated events never fail decoding.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: GatewayEventKind,
    pub data: GatewayEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEventData {
    pub object: serde_json::Value,
}

impl GatewayEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Decodes `data.object` as a checkout session. Call only after
    /// matching on `kind`.
    pub fn checkout_session(&self) -> Result<CheckoutSessionObject, serde_json::Error> {
        serde_json::from_value(self.data.object.clone())
    }
}

/// The slice of the gateway's checkout-session object this service reads.
/// Everything the gateway may omit is optional here; requiredness is
/// enforced by the confirmation flow, not the decoder.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    #[serde(default)]
    pub shipping_details: Option<ShippingDetails>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSessionObject {
    /// Purchaser email: top-level field first, then the details block.
    pub fn email(&self) -> Option<&str> {
        self.customer_email.as_deref().or_else(|| {
            self.customer_details
                .as_ref()
                .and_then(|d| d.email.as_deref())
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<GatewayAddress>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShippingDetails {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<GatewayAddress>,
}

impl ShippingDetails {
    /// Renders the gateway-collected address as the multi-line string stored
    /// on the order. Returns `None` when no address block was attached.
    pub fn flatten(&self) -> Option<String> {
        let address = self.address.as_ref()?;
        let mut out = String::new();
        if let Some(name) = self.name.as_deref() {
            out.push_str(name);
            out.push('\n');
        }
        if let Some(line1) = address.line1.as_deref() {
            out.push_str(line1);
            out.push('\n');
        }
        if let Some(line2) = address.line2.as_deref() {
            out.push_str(line2);
            out.push('\n');
        }
        out.push_str(&format!(
            "{}, {} {}",
            address.city.as_deref().unwrap_or_default(),
            address.state.as_deref().unwrap_or_default(),
            address.postal_code.as_deref().unwrap_or_default(),
        ));
        if let Some(country) = address.country.as_deref() {
            out.push('\n');
            out.push_str(country);
        }
        Some(out)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayAddress {
    #[serde(default)]
    pub line1: Option<String>,
    #[serde(default)]
    pub line2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}
