use crate::errors::ApiError;
use crate::handlers::AppState;
use axum::{
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use metrics::counter;
use serde_json::json;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Receive a payment gateway event.
///
/// The raw body bytes are what the signature covers, so this handler takes
/// the body unparsed and leaves all decoding to the service. Every verified
/// delivery is acknowledged with `{"received": true}` whether or not it
/// produced an order, so the gateway never retries events we chose to skip.
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/stripe",
    request_body = String,
    responses(
        (status = 200, description = "Delivery acknowledged"),
        (status = 400, description = "Unusable payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Signature verification failed", body = crate::errors::ErrorResponse)
    ),
    tag = "Webhooks"
)]
pub async fn gateway_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    state
        .services
        .webhooks
        .handle_delivery(signature, &body)
        .await
        .map_err(|e| {
            counter!("webhooks.deliveries.failed", 1);
            ApiError::Service(e)
        })?;

    Ok(Json(json!({ "received": true })))
}

pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/stripe", post(gateway_webhook))
}
