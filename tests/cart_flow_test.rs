//! Integration tests for session carts.
//!
//! Covers the storefront summary arithmetic (sale prices, the flat
//! shipping fee and the free-shipping threshold), stock bounds on cart
//! mutations, and checking out a server-held cart.

mod common;

use axum::http::Method;
use common::{decimal, response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn open_cart(app: &TestApp) -> String {
    let response = app.request(Method::POST, "/api/v1/carts", None, None).await;
    assert_eq!(response.status(), 201);
    let body = response_json(response).await;
    body["data"]["cart_id"]
        .as_str()
        .expect("cart id in create response")
        .to_string()
}

async fn add_item(app: &TestApp, cart_id: &str, product_id: Uuid) -> axum::response::Response {
    app.request(
        Method::POST,
        &format!("/api/v1/carts/{cart_id}/items"),
        Some(json!({ "product_id": product_id })),
        None,
    )
    .await
}

#[tokio::test]
async fn storefront_summary_scenario() {
    let app = TestApp::new().await;
    let shirt = app.seed_product("Logo Tee", dec!(20.00), None, 10).await;
    let cap = app.seed_product("Cap", dec!(15.00), None, 5).await;

    let cart_id = open_cart(&app).await;

    assert_eq!(add_item(&app, &cart_id, shirt.id).await.status(), 200);
    assert_eq!(add_item(&app, &cart_id, shirt.id).await.status(), 200);
    let response = add_item(&app, &cart_id, cap.id).await;
    assert_eq!(response.status(), 200);

    // $20 x 2 + $15 = $55; under the $100 threshold, so the $9.99 flat fee
    // applies and the grand total is $64.99.
    let body = response_json(response).await;
    let totals = &body["data"]["totals"];
    assert_eq!(decimal(&totals["subtotal"]), dec!(55));
    assert_eq!(decimal(&totals["shipping"]), dec!(9.99));
    assert_eq!(decimal(&totals["total"]), dec!(64.99));
    assert_eq!(totals["item_count"], json!(3));

    let items = body["data"]["items"].as_array().expect("cart items");
    assert_eq!(items.len(), 2);
}

#[tokio::test]
async fn free_shipping_applies_strictly_above_threshold() {
    let app = TestApp::new().await;
    let coat = app.seed_product("Coat", dec!(100.00), None, 10).await;

    let cart_id = open_cart(&app).await;

    // Exactly at the threshold still pays shipping.
    let at_threshold = response_json(add_item(&app, &cart_id, coat.id).await).await;
    assert_eq!(decimal(&at_threshold["data"]["totals"]["shipping"]), dec!(9.99));

    let above = response_json(add_item(&app, &cart_id, coat.id).await).await;
    assert_eq!(decimal(&above["data"]["totals"]["shipping"]), dec!(0));
    assert_eq!(decimal(&above["data"]["totals"]["total"]), dec!(200));
}

#[tokio::test]
async fn sale_price_drives_cart_arithmetic() {
    let app = TestApp::new().await;
    let tee = app
        .seed_product("Sale Tee", dec!(25.00), Some(dec!(19.99)), 10)
        .await;

    let cart_id = open_cart(&app).await;
    let body = response_json(add_item(&app, &cart_id, tee.id).await).await;

    assert_eq!(decimal(&body["data"]["totals"]["subtotal"]), dec!(19.99));
}

#[tokio::test]
async fn stock_bounds_cart_mutations() {
    let app = TestApp::new().await;
    let rare = app.seed_product("Rare Print", dec!(40.00), None, 1).await;

    let cart_id = open_cart(&app).await;
    assert_eq!(add_item(&app, &cart_id, rare.id).await.status(), 200);

    // A second unit exceeds stock.
    let response = add_item(&app, &cart_id, rare.id).await;
    assert_eq!(response.status(), 422);

    // So does updating the line past the stock level.
    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/carts/{cart_id}/items/{}", rare.id),
            Some(json!({ "quantity": 3 })),
            None,
        )
        .await;
    assert_eq!(response.status(), 422);
}

#[tokio::test]
async fn quantity_updates_and_removal() {
    let app = TestApp::new().await;
    let shirt = app.seed_product("Logo Tee", dec!(20.00), None, 10).await;

    let cart_id = open_cart(&app).await;
    add_item(&app, &cart_id, shirt.id).await;

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/carts/{cart_id}/items/{}", shirt.id),
            Some(json!({ "quantity": 5 })),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["data"]["totals"]["item_count"], json!(5));

    // Zero removes the line.
    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/carts/{cart_id}/items/{}", shirt.id),
            Some(json!({ "quantity": 0 })),
            None,
        )
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["items"], json!([]));

    // Raising the quantity of a line that is no longer there is an error.
    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/carts/{cart_id}/items/{}", shirt.id),
            Some(json!({ "quantity": 2 })),
            None,
        )
        .await;
    assert_eq!(response.status(), 404);

    // Removing it again stays idempotent.
    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/carts/{cart_id}/items/{}", shirt.id),
            None,
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn unknown_cart_and_product_are_not_found() {
    let app = TestApp::new().await;
    let shirt = app.seed_product("Logo Tee", dec!(20.00), None, 10).await;

    let missing_cart = Uuid::new_v4();
    let response = add_item(&app, &missing_cart.to_string(), shirt.id).await;
    assert_eq!(response.status(), 404);

    let cart_id = open_cart(&app).await;
    let response = add_item(&app, &cart_id, Uuid::new_v4()).await;
    assert_eq!(response.status(), 404);
    let body = response_json(response).await;
    assert_eq!(body["message"], "Product not found");
}

#[tokio::test]
async fn dropping_the_session_forgets_the_cart() {
    let app = TestApp::new().await;
    let cart_id = open_cart(&app).await;

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/carts/{cart_id}"),
            None,
            None,
        )
        .await;
    assert_eq!(response.status(), 204);

    let response = app
        .request(Method::GET, &format!("/api/v1/carts/{cart_id}"), None, None)
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn checkout_uses_the_stored_cart() {
    let gateway = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        // Two units of the stored tee at its sale price.
        .and(body_string_contains("unit_amount%5D=1999"))
        .and(body_string_contains("quantity%5D=2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_from_cart",
            "url": "https://gateway.example/c/pay/cs_from_cart"
        })))
        .expect(1)
        .mount(&gateway)
        .await;

    let app = TestApp::with_config(|cfg| {
        cfg.stripe_api_base = gateway.uri();
    })
    .await;
    let tee = app
        .seed_product("Sale Tee", dec!(25.00), Some(dec!(19.99)), 10)
        .await;

    let cart_id = open_cart(&app).await;
    add_item(&app, &cart_id, tee.id).await;
    add_item(&app, &cart_id, tee.id).await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/carts/{cart_id}/checkout"),
            Some(json!({
                "customerEmail": "ada@example.com",
                "shippingAddress": {
                    "firstName": "Ada",
                    "lastName": "Lovelace",
                    "address": "1 Analytical Way",
                    "city": "London",
                    "state": "LDN",
                    "zipCode": "12345",
                    "country": "GB"
                }
            })),
            None,
        )
        .await;

    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["sessionId"], json!("cs_from_cart"));
}

#[tokio::test]
async fn checkout_of_an_empty_cart_is_rejected() {
    let app = TestApp::new().await;
    let cart_id = open_cart(&app).await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/carts/{cart_id}/checkout"),
            Some(json!({
                "customerEmail": "ada@example.com",
                "shippingAddress": {
                    "firstName": "Ada",
                    "lastName": "Lovelace",
                    "address": "1 Analytical Way",
                    "city": "London",
                    "state": "LDN",
                    "zipCode": "12345",
                    "country": "GB"
                }
            })),
            None,
        )
        .await;

    assert_eq!(response.status(), 400);
}
