use super::common::{map_service_error, success_response, validate_input};
use crate::errors::ApiError;
use crate::handlers::AppState;
use crate::services::checkout::{CheckoutSessionResponse, CreateCheckoutSessionRequest};
use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::post,
    Router,
};

/// Create a hosted checkout session for the posted cart contents.
///
/// The response body is the bare session reference the storefront redirects
/// with, not the envelope the rest of the API uses.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/session",
    request_body = CreateCheckoutSessionRequest,
    responses(
        (status = 200, description = "Hosted session created", body = CheckoutSessionResponse),
        (status = 400, description = "Empty cart or invalid input", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment gateway failure", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn create_checkout_session(
    State(state): State<AppState>,
    Json(request): Json<CreateCheckoutSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&request)?;

    let session = state
        .services
        .checkout
        .create_session(request)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(session))
}

pub fn checkout_routes() -> Router<AppState> {
    Router::new().route("/session", post(create_checkout_session))
}
