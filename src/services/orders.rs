use crate::{
    db::DbPool,
    entities::order::{
        self, ActiveModel as OrderActiveModel, Entity as OrderEntity, OrderStatus,
    },
    entities::order_item::{
        self, ActiveModel as OrderItemActiveModel, Entity as OrderItemEntity,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// One line of a paid checkout, already priced.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: Decimal,
}

/// Everything the confirmation flow derived from a completed payment.
#[derive(Debug, Clone)]
pub struct NewPaidOrder {
    pub customer_id: Option<Uuid>,
    pub total: Decimal,
    pub shipping_address: String,
    pub payment_intent_id: String,
    pub items: Vec<NewOrderItem>,
}

/// Whether `record_paid_checkout` wrote a new order or found the payment
/// already recorded by an earlier delivery.
#[derive(Debug)]
pub enum PaidOrderOutcome {
    Created(order::Model),
    AlreadyRecorded(order::Model),
}

impl PaidOrderOutcome {
    pub fn order(&self) -> &order::Model {
        match self {
            PaidOrderOutcome::Created(order) => order,
            PaidOrderOutcome::AlreadyRecorded(order) => order,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub customer_id: Option<Uuid>,
    pub total: Decimal,
    pub status: OrderStatus,
    pub shipping_address: String,
    pub payment_intent_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<order::Model> for OrderResponse {
    fn from(model: order::Model) -> Self {
        Self {
            id: model.id,
            customer_id: model.customer_id,
            total: model.total,
            status: model.status,
            shipping_address: model.shipping_address,
            payment_intent_id: model.payment_intent_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: Decimal,
}

impl From<order_item::Model> for OrderItemResponse {
    fn from(model: order_item::Model) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            quantity: model.quantity,
            price: model.price,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderDetailResponse {
    #[serde(flatten)]
    pub order: OrderResponse,
    pub items: Vec<OrderItemResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Persistence for orders materialized from completed payments, and the
/// read-back surface on top of them.
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Writes the order and all of its items in one transaction, keyed by
    /// the gateway's payment reference.
    ///
    /// A payment already on file short-circuits to `AlreadyRecorded`. Two
    /// deliveries racing past that check both reach the insert; the loser
    /// hits the unique index on `payment_intent_id` and is resolved to the
    /// winner's row instead of erroring.
    #[instrument(skip(self, new), fields(payment_intent_id = %new.payment_intent_id, item_count = new.items.len()))]
    pub async fn record_paid_checkout(
        &self,
        new: NewPaidOrder,
    ) -> Result<PaidOrderOutcome, ServiceError> {
        if new.items.is_empty() {
            return Err(ServiceError::InvalidInput(
                "An order must contain at least one item".to_string(),
            ));
        }

        let db = &*self.db_pool;

        if let Some(existing) = self.find_by_payment_intent(&new.payment_intent_id).await? {
            info!(
                order_id = %existing.id,
                "Payment already recorded, skipping duplicate delivery"
            );
            self.event_sender
                .send_or_log(Event::DuplicatePaymentIgnored {
                    order_id: existing.id,
                    payment_intent_id: new.payment_intent_id,
                })
                .await;
            return Ok(PaidOrderOutcome::AlreadyRecorded(existing));
        }

        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order creation");
            ServiceError::DatabaseError(e)
        })?;

        let order_model = OrderActiveModel {
            id: Set(order_id),
            customer_id: Set(new.customer_id),
            total: Set(new.total),
            status: Set(OrderStatus::Pending),
            shipping_address: Set(new.shipping_address.clone()),
            payment_intent_id: Set(new.payment_intent_id.clone()),
            created_at: Set(now),
            updated_at: Set(None),
        };

        let inserted = match order_model.insert(&txn).await {
            Ok(model) => model,
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                drop(txn);
                warn!(
                    payment_intent_id = %new.payment_intent_id,
                    "Concurrent delivery won the order insert"
                );
                let existing = self
                    .find_by_payment_intent(&new.payment_intent_id)
                    .await?
                    .ok_or(ServiceError::DatabaseError(e))?;
                self.event_sender
                    .send_or_log(Event::DuplicatePaymentIgnored {
                        order_id: existing.id,
                        payment_intent_id: new.payment_intent_id,
                    })
                    .await;
                return Ok(PaidOrderOutcome::AlreadyRecorded(existing));
            }
            Err(e) => {
                error!(error = %e, order_id = %order_id, "Failed to insert order");
                return Err(ServiceError::DatabaseError(e));
            }
        };

        let item_models: Vec<OrderItemActiveModel> = new
            .items
            .iter()
            .map(|item| OrderItemActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(item.product_id),
                quantity: Set(item.quantity),
                price: Set(item.price),
            })
            .collect();

        OrderItemEntity::insert_many(item_models)
            .exec(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to insert order items");
                ServiceError::DatabaseError(e)
            })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit order transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            order_id = %order_id,
            total = %inserted.total,
            "Order created from completed payment"
        );
        self.event_sender
            .send_or_log(Event::OrderPlaced {
                order_id,
                payment_intent_id: inserted.payment_intent_id.clone(),
            })
            .await;

        Ok(PaidOrderOutcome::Created(inserted))
    }

    async fn find_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<order::Model>, ServiceError> {
        let db = &*self.db_pool;

        OrderEntity::find()
            .filter(order::Column::PaymentIntentId.eq(payment_intent_id))
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to look up order by payment reference");
                ServiceError::DatabaseError(e)
            })
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<OrderDetailResponse>, ServiceError> {
        let db = &*self.db_pool;

        let mut results = OrderEntity::find_by_id(order_id)
            .find_with_related(OrderItemEntity)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to fetch order");
                ServiceError::DatabaseError(e)
            })?;

        Ok(results.pop().map(|(order, items)| OrderDetailResponse {
            order: order.into(),
            items: items.into_iter().map(Into::into).collect(),
        }))
    }

    /// A customer's orders, newest first.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn list_for_customer(
        &self,
        customer_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListResponse, ServiceError> {
        self.list_filtered(
            OrderEntity::find().filter(order::Column::CustomerId.eq(customer_id)),
            page,
            per_page,
        )
        .await
    }

    /// Admin listing across all customers, optionally narrowed by status.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        page: u64,
        per_page: u64,
        status: Option<OrderStatus>,
    ) -> Result<OrderListResponse, ServiceError> {
        let mut query = OrderEntity::find();
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status));
        }
        self.list_filtered(query, page, per_page).await
    }

    async fn list_filtered(
        &self,
        query: sea_orm::Select<OrderEntity>,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListResponse, ServiceError> {
        let db = &*self.db_pool;
        let page = page.max(1);

        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(db, per_page);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count orders");
            ServiceError::DatabaseError(e)
        })?;

        let orders = paginator.fetch_page(page - 1).await.map_err(|e| {
            error!(error = %e, page = page, per_page = per_page, "Failed to fetch orders page");
            ServiceError::DatabaseError(e)
        })?;

        Ok(OrderListResponse {
            orders: orders.into_iter().map(Into::into).collect(),
            total,
            page,
            per_page,
        })
    }

    #[instrument(skip(self), fields(order_id = %order_id, new_status = ?request.status))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        request: UpdateOrderStatusRequest,
    ) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db_pool;

        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to fetch order for status update");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound("Order".to_string()))?;

        let old_status = order.status;

        let mut active_model: OrderActiveModel = order.into();
        active_model.status = Set(request.status);
        active_model.updated_at = Set(Some(Utc::now()));

        let updated = active_model.update(db).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to update order status");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            order_id = %order_id,
            old_status = ?old_status,
            new_status = ?updated.status,
            "Order status updated"
        );
        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status: updated.status,
            })
            .await;

        Ok(updated.into())
    }
}
