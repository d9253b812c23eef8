use super::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
    PaginationParams,
};
use crate::errors::ApiError;
use crate::handlers::AppState;
use crate::services::catalog::{
    CreateProductRequest, ProductListResponse, ProductResponse, UpdateProductRequest,
};
use crate::ApiResponse;
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ProductFilterParams {
    /// Filter by category
    pub category: Option<String>,
    /// Only products flagged as featured
    pub featured: Option<bool>,
}

/// List products, newest first
#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(PaginationParams, ProductFilterParams),
    responses(
        (status = 200, description = "Product listing", body = ApiResponse<ProductListResponse>),
        (status = 500, description = "Internal error", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<ProductFilterParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, per_page) = pagination.limits();
    let list = state
        .services
        .products
        .list_products(page, per_page, filter.category, filter.featured)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::success(list)))
}

/// Fetch a single product
#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product detail", body = ApiResponse<ProductResponse>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .products
        .get_product(id)
        .await
        .map_err(map_service_error)?
        .ok_or_else(|| {
            map_service_error(crate::errors::ServiceError::NotFound("Product".to_string()))
        })?;

    Ok(success_response(ApiResponse::success(product)))
}

/// Create a product (admin)
#[utoipa::path(
    post,
    path = "/api/v1/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = ApiResponse<ProductResponse>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 401, description = "Missing or invalid admin token", body = crate::errors::ErrorResponse)
    ),
    security(("admin_token" = [])),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    Json(request): Json<CreateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&request)?;

    let product = state
        .services
        .products
        .create_product(request)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(ApiResponse::success(product)))
}

/// Update a product (admin)
#[utoipa::path(
    put,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<ProductResponse>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 401, description = "Missing or invalid admin token", body = crate::errors::ErrorResponse)
    ),
    security(("admin_token" = [])),
    tag = "Products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&request)?;

    let product = state
        .services
        .products
        .update_product(id, request)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::success(product)))
}

/// Delete a product (admin)
#[utoipa::path(
    delete,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 401, description = "Missing or invalid admin token", body = crate::errors::ErrorResponse)
    ),
    security(("admin_token" = [])),
    tag = "Products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .products
        .delete_product(id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/:id", get(get_product))
}

/// Mutating routes; the caller layers the admin-token check on top.
pub fn product_admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_product))
        .route("/:id", put(update_product).delete(delete_product))
}
