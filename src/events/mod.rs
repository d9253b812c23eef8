use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, info};
use uuid::Uuid;

use crate::entities::order::OrderStatus;

/// Domain events published by the services. Consumers only observe; nothing
/// on the request path waits for them.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    ProductCreated(Uuid),
    ProductUpdated(Uuid),
    ProductDeleted(Uuid),
    CustomerCreated(Uuid),
    CheckoutSessionCreated {
        session_id: String,
        item_count: usize,
    },
    OrderPlaced {
        order_id: Uuid,
        payment_intent_id: String,
    },
    DuplicatePaymentIgnored {
        order_id: Uuid,
        payment_intent_id: String,
    },
    OrderStatusChanged {
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
}

/// Cloneable handle for publishing events onto the in-process channel.
#[derive(Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Publish without failing the caller; a full or closed channel is a
    /// logged defect, never a request error.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            error!("Failed to publish event: {}", e);
        }
    }
}

/// Consumer loop draining the event channel. Runs until every sender is
/// dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        match &event {
            Event::ProductCreated(id) => info!(product_id = %id, "Product created"),
            Event::ProductUpdated(id) => info!(product_id = %id, "Product updated"),
            Event::ProductDeleted(id) => info!(product_id = %id, "Product deleted"),
            Event::CustomerCreated(id) => info!(customer_id = %id, "Customer created"),
            Event::CheckoutSessionCreated {
                session_id,
                item_count,
            } => {
                info!(%session_id, item_count, "Checkout session created");
            }
            Event::OrderPlaced {
                order_id,
                payment_intent_id,
            } => {
                info!(%order_id, %payment_intent_id, "Order placed");
            }
            Event::DuplicatePaymentIgnored {
                order_id,
                payment_intent_id,
            } => {
                info!(
                    %order_id,
                    %payment_intent_id,
                    "Duplicate payment event ignored"
                );
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(
                    %order_id,
                    old_status = ?old_status,
                    new_status = ?new_status,
                    "Order status changed"
                );
            }
        }
    }

    info!("Event channel closed; consumer loop exiting");
}
