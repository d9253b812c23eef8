use super::common::{map_service_error, success_response, PaginationParams};
use crate::entities::order::OrderStatus;
use crate::errors::{ApiError, ServiceError};
use crate::handlers::AppState;
use crate::services::orders::{
    OrderDetailResponse, OrderListResponse, OrderResponse, UpdateOrderStatusRequest,
};
use crate::ApiResponse;
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, put},
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Deserialize, IntoParams)]
pub struct CustomerOrdersParams {
    /// Customer whose order history to return.
    pub customer_id: Uuid,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct OrderFilterParams {
    /// Restrict the listing to a single fulfillment status.
    pub status: Option<OrderStatus>,
}

/// List a customer's orders, newest first
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(CustomerOrdersParams, PaginationParams),
    responses(
        (status = 200, description = "Order history page", body = ApiResponse<OrderListResponse>)
    ),
    tag = "Orders"
)]
pub async fn list_customer_orders(
    State(state): State<AppState>,
    Query(params): Query<CustomerOrdersParams>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, per_page) = pagination.limits();
    let orders = state
        .services
        .orders
        .list_for_customer(params.customer_id, page, per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::success(orders)))
}

/// Fetch one order with its line items
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order detail", body = ApiResponse<OrderDetailResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .get_order(id)
        .await
        .map_err(map_service_error)?
        .ok_or_else(|| map_service_error(ServiceError::NotFound("Order".to_string())))?;

    Ok(success_response(ApiResponse::success(order)))
}

/// List every order, optionally filtered by status (admin)
#[utoipa::path(
    get,
    path = "/api/v1/admin/orders",
    params(OrderFilterParams, PaginationParams),
    responses(
        (status = 200, description = "Order page", body = ApiResponse<OrderListResponse>),
        (status = 401, description = "Missing or invalid admin token", body = crate::errors::ErrorResponse)
    ),
    security(("admin_token" = [])),
    tag = "Orders"
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    Query(filter): Query<OrderFilterParams>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, per_page) = pagination.limits();
    let orders = state
        .services
        .orders
        .list_orders(page, per_page, filter.status)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::success(orders)))
}

/// Move an order to a new fulfillment status (admin)
#[utoipa::path(
    put,
    path = "/api/v1/admin/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<OrderResponse>),
        (status = 401, description = "Missing or invalid admin token", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("admin_token" = [])),
    tag = "Orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .update_status(id, request)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::success(order)))
}

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_customer_orders))
        .route("/:id", get(get_order))
}

pub fn order_admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all_orders))
        .route("/:id/status", put(update_order_status))
}
