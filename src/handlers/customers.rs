use super::common::{created_response, map_service_error, success_response, validate_input};
use crate::errors::{ApiError, ServiceError};
use crate::handlers::AppState;
use crate::services::customers::{CreateCustomerRequest, CustomerResponse};
use crate::ApiResponse;
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use uuid::Uuid;

/// Sync a shadow identity from the auth provider (admin)
///
/// Keyed by the provider's subject id. An email already on file resolves to
/// the existing row instead of erroring, so repeated syncs are safe.
#[utoipa::path(
    post,
    path = "/api/v1/customers",
    request_body = CreateCustomerRequest,
    responses(
        (status = 201, description = "Customer recorded", body = ApiResponse<CustomerResponse>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 401, description = "Missing or invalid admin token", body = crate::errors::ErrorResponse)
    ),
    security(("admin_token" = [])),
    tag = "Customers"
)]
pub async fn create_customer(
    State(state): State<AppState>,
    Json(request): Json<CreateCustomerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&request)?;

    let customer = state
        .services
        .customers
        .ensure_customer(request.id, &request.email, request.name)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(ApiResponse::success(
        CustomerResponse::from(customer),
    )))
}

/// Fetch a shadow identity (admin)
#[utoipa::path(
    get,
    path = "/api/v1/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer id")),
    responses(
        (status = 200, description = "Customer detail", body = ApiResponse<CustomerResponse>),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse),
        (status = 401, description = "Missing or invalid admin token", body = crate::errors::ErrorResponse)
    ),
    security(("admin_token" = [])),
    tag = "Customers"
)]
pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let customer = state
        .services
        .customers
        .get_customer(id)
        .await
        .map_err(map_service_error)?
        .ok_or_else(|| map_service_error(ServiceError::NotFound("Customer".to_string())))?;

    Ok(success_response(ApiResponse::success(
        CustomerResponse::from(customer),
    )))
}

/// Identity routes; the caller layers the admin-token check on top.
pub fn customer_admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_customer))
        .route("/:id", get(get_customer))
}
