use super::common::{created_response, map_service_error, no_content_response, success_response};
use crate::cart::{Cart, CartItem, CartTotals, ProductSummary};
use crate::errors::{ApiError, ServiceError};
use crate::handlers::AppState;
use crate::payments::intent::ShippingAddress;
use crate::services::checkout::{CheckoutSessionResponse, CreateCheckoutSessionRequest};
use crate::ApiResponse;
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct CartView {
    pub cart_id: Uuid,
    pub items: Vec<CartItem>,
    pub totals: CartTotals,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddCartItemRequest {
    pub product_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    /// New quantity; zero or below removes the line.
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CartCheckoutRequest {
    #[serde(rename = "customerEmail")]
    pub customer_email: String,
    #[serde(rename = "shippingAddress")]
    pub shipping_address: ShippingAddress,
}

fn cart_view(state: &AppState, cart_id: Uuid, cart: Cart) -> CartView {
    let flat_fee = Decimal::new(state.config.shipping_fee_cents, 2);
    let totals = cart.totals(state.config.free_shipping_threshold, flat_fee);
    CartView {
        cart_id,
        items: cart.items().to_vec(),
        totals,
    }
}

fn cart_not_found() -> ApiError {
    map_service_error(ServiceError::NotFound("Cart".to_string()))
}

/// Open a new cart session
#[utoipa::path(
    post,
    path = "/api/v1/carts",
    responses(
        (status = 201, description = "Cart session opened", body = ApiResponse<CartView>)
    ),
    tag = "Carts"
)]
pub async fn create_cart(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let cart_id = state.carts.create();

    Ok(created_response(ApiResponse::success(cart_view(
        &state,
        cart_id,
        Cart::new(),
    ))))
}

/// Fetch a cart with its derived totals
#[utoipa::path(
    get,
    path = "/api/v1/carts/{id}",
    params(("id" = Uuid, Path, description = "Cart session id")),
    responses(
        (status = 200, description = "Cart contents", body = ApiResponse<CartView>),
        (status = 404, description = "Cart not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Carts"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state.carts.get(id).ok_or_else(cart_not_found)?;

    Ok(success_response(ApiResponse::success(cart_view(
        &state, id, cart,
    ))))
}

/// Add one unit of a product to the cart
#[utoipa::path(
    post,
    path = "/api/v1/carts/{id}/items",
    params(("id" = Uuid, Path, description = "Cart session id")),
    request_body = AddCartItemRequest,
    responses(
        (status = 200, description = "Item added", body = ApiResponse<CartView>),
        (status = 404, description = "Cart or product not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Not enough stock", body = crate::errors::ErrorResponse)
    ),
    tag = "Carts"
)]
pub async fn add_cart_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AddCartItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .products
        .get_product(request.product_id)
        .await
        .map_err(map_service_error)?
        .ok_or_else(|| {
            map_service_error(ServiceError::NotFound("Product".to_string()))
        })?;

    let summary = ProductSummary {
        id: product.id,
        name: product.name.clone(),
        description: product.description.clone(),
        price: product.price,
        sale_price: product.sale_price,
        image_url: product.image_url.clone(),
        stock: product.stock,
    };

    let result = state
        .carts
        .with_cart(id, |cart| {
            let wanted = cart.quantity_of(summary.id) + 1;
            if product.stock <= 0 || wanted > product.stock as u32 {
                return Err(ServiceError::InsufficientStock(format!(
                    "Only {} of {} in stock",
                    product.stock.max(0),
                    product.name
                )));
            }
            cart.add_item(summary.clone());
            Ok(cart.clone())
        })
        .ok_or_else(cart_not_found)?;

    let cart = result.map_err(map_service_error)?;
    Ok(success_response(ApiResponse::success(cart_view(
        &state, id, cart,
    ))))
}

/// Set the quantity of a cart line; zero or below removes it
#[utoipa::path(
    put,
    path = "/api/v1/carts/{id}/items/{product_id}",
    params(
        ("id" = Uuid, Path, description = "Cart session id"),
        ("product_id" = Uuid, Path, description = "Product id")
    ),
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "Quantity updated", body = ApiResponse<CartView>),
        (status = 404, description = "Cart or line not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Not enough stock", body = crate::errors::ErrorResponse)
    ),
    tag = "Carts"
)]
pub async fn update_cart_item(
    State(state): State<AppState>,
    Path((id, product_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdateCartItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .carts
        .with_cart(id, |cart| {
            if request.quantity > 0 && cart.quantity_of(product_id) == 0 {
                return Err(ServiceError::NotFound("Cart item".to_string()));
            }
            if request.quantity > 0 {
                let in_cart = cart
                    .items()
                    .iter()
                    .find(|item| item.product.id == product_id)
                    .map(|item| item.product.stock)
                    .unwrap_or(0);
                if request.quantity > in_cart {
                    return Err(ServiceError::InsufficientStock(format!(
                        "Only {} in stock",
                        in_cart.max(0)
                    )));
                }
            }
            cart.update_quantity(product_id, request.quantity);
            Ok(cart.clone())
        })
        .ok_or_else(cart_not_found)?;

    let cart = result.map_err(map_service_error)?;
    Ok(success_response(ApiResponse::success(cart_view(
        &state, id, cart,
    ))))
}

/// Remove a line from the cart
#[utoipa::path(
    delete,
    path = "/api/v1/carts/{id}/items/{product_id}",
    params(
        ("id" = Uuid, Path, description = "Cart session id"),
        ("product_id" = Uuid, Path, description = "Product id")
    ),
    responses(
        (status = 200, description = "Line removed", body = ApiResponse<CartView>),
        (status = 404, description = "Cart not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Carts"
)]
pub async fn remove_cart_item(
    State(state): State<AppState>,
    Path((id, product_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state
        .carts
        .with_cart(id, |cart| {
            cart.remove_item(product_id);
            cart.clone()
        })
        .ok_or_else(cart_not_found)?;

    Ok(success_response(ApiResponse::success(cart_view(
        &state, id, cart,
    ))))
}

/// Drop the cart session entirely
#[utoipa::path(
    delete,
    path = "/api/v1/carts/{id}",
    params(("id" = Uuid, Path, description = "Cart session id")),
    responses(
        (status = 204, description = "Cart session dropped"),
        (status = 404, description = "Cart not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Carts"
)]
pub async fn delete_cart(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.carts.remove(id).ok_or_else(cart_not_found)?;
    Ok(no_content_response())
}

/// Check out a stored cart through the hosted payment gateway
#[utoipa::path(
    post,
    path = "/api/v1/carts/{id}/checkout",
    params(("id" = Uuid, Path, description = "Cart session id")),
    request_body = CartCheckoutRequest,
    responses(
        (status = 200, description = "Hosted session created", body = CheckoutSessionResponse),
        (status = 400, description = "Empty cart or invalid input", body = crate::errors::ErrorResponse),
        (status = 404, description = "Cart not found", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment gateway failure", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn checkout_cart(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<CartCheckoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state.carts.get(id).ok_or_else(cart_not_found)?;

    let session = state
        .services
        .checkout
        .create_session(CreateCheckoutSessionRequest {
            items: cart.items().to_vec(),
            customer_email: request.customer_email,
            shipping_address: request.shipping_address,
        })
        .await
        .map_err(map_service_error)?;

    Ok(success_response(session))
}

pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_cart))
        .route("/:id", get(get_cart).delete(delete_cart))
        .route("/:id/items", post(add_cart_item))
        .route(
            "/:id/items/:product_id",
            put(update_cart_item).delete(remove_cart_item),
        )
        .route("/:id/checkout", post(checkout_cart))
}
