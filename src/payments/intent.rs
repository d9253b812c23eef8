use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

pub const METADATA_ORDER_ITEMS: &str = "orderItems";
pub const METADATA_SHIPPING_ADDRESS: &str = "shippingAddress";
pub const METADATA_SCHEMA_VERSION: &str = "schemaVersion";

/// Bumped whenever the encoded shape changes. Decoding tolerates an absent
/// version key but rejects versions it does not know.
pub const SCHEMA_VERSION: &str = "1";

#[derive(Debug, Error)]
pub enum IntentError {
    #[error("order items metadata is missing")]
    MissingOrderItems,
    #[error("order items metadata contains no items")]
    EmptyOrderItems,
    #[error("order items metadata is malformed: {0}")]
    MalformedOrderItems(#[source] serde_json::Error),
    #[error("shipping address metadata is malformed: {0}")]
    MalformedShippingAddress(#[source] serde_json::Error),
    #[error("unsupported intent schema version {0}")]
    UnsupportedVersion(String),
    #[error("intent could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),
}

/// One purchased line, frozen at checkout time. `price` is the effective
/// unit price that was charged, not the current catalog price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IntentLineItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: u32,
    pub price: Decimal,
}

/// Shipping form fields collected before redirecting to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    #[validate(length(min = 1, message = "Street address is required"))]
    pub address: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "State is required"))]
    pub state: String,
    #[validate(length(min = 1, message = "Zip code is required"))]
    pub zip_code: String,
    #[validate(length(min = 1, message = "Country is required"))]
    pub country: String,
}

impl ShippingAddress {
    /// Renders the form as the multi-line string stored on the order.
    pub fn flatten(&self) -> String {
        format!(
            "{} {}\n{}\n{}, {} {}\n{}",
            self.first_name,
            self.last_name,
            self.address,
            self.city,
            self.state,
            self.zip_code,
            self.country
        )
    }
}

/// What the webhook needs to rebuild an order, round-tripped through the
/// gateway's string-to-string metadata map. Never persisted on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutIntent {
    pub items: Vec<IntentLineItem>,
    pub shipping_address: Option<ShippingAddress>,
}

impl CheckoutIntent {
    pub fn new(items: Vec<IntentLineItem>, shipping_address: Option<ShippingAddress>) -> Self {
        Self {
            items,
            shipping_address,
        }
    }

    pub fn to_metadata(&self) -> Result<HashMap<String, String>, IntentError> {
        let mut metadata = HashMap::new();
        metadata.insert(
            METADATA_ORDER_ITEMS.to_string(),
            serde_json::to_string(&self.items).map_err(IntentError::Encode)?,
        );
        let address = match &self.shipping_address {
            Some(addr) => serde_json::to_string(addr).map_err(IntentError::Encode)?,
            None => String::new(),
        };
        metadata.insert(METADATA_SHIPPING_ADDRESS.to_string(), address);
        metadata.insert(
            METADATA_SCHEMA_VERSION.to_string(),
            SCHEMA_VERSION.to_string(),
        );
        Ok(metadata)
    }

    pub fn from_metadata(metadata: &HashMap<String, String>) -> Result<Self, IntentError> {
        if let Some(version) = metadata.get(METADATA_SCHEMA_VERSION) {
            if version != SCHEMA_VERSION {
                return Err(IntentError::UnsupportedVersion(version.clone()));
            }
        }

        let raw_items = metadata
            .get(METADATA_ORDER_ITEMS)
            .filter(|raw| !raw.is_empty())
            .ok_or(IntentError::MissingOrderItems)?;
        let items: Vec<IntentLineItem> =
            serde_json::from_str(raw_items).map_err(IntentError::MalformedOrderItems)?;
        if items.is_empty() {
            return Err(IntentError::EmptyOrderItems);
        }

        let shipping_address = match metadata
            .get(METADATA_SHIPPING_ADDRESS)
            .filter(|raw| !raw.is_empty())
        {
            Some(raw) => {
                Some(serde_json::from_str(raw).map_err(IntentError::MalformedShippingAddress)?)
            }
            None => None,
        };

        Ok(Self {
            items,
            shipping_address,
        })
    }
}
