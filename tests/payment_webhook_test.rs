//! Integration tests for the payment gateway webhook.
//!
//! Covers signature verification, order materialization from the session
//! metadata, duplicate-delivery idempotency, purchaser resolution through
//! the auth directory, and the acknowledgement contract for event kinds
//! the handler does not act on.

mod common;

use chrono::Utc;
use common::{completed_checkout_event, response_json, TestApp, TEST_WEBHOOK_SECRET};
use rust_decimal_macros::dec;
use serde_json::json;
use storefront_api::entities::order::OrderStatus;
use storefront_api::payments::signature::signature_header;
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn two_line_items(product_a: Uuid, product_b: Uuid) -> serde_json::Value {
    json!([
        {"productId": product_a, "productName": "Logo Tee", "quantity": 2, "price": 20},
        {"productId": product_b, "productName": "Cap", "quantity": 1, "price": 9.98}
    ])
}

fn ada_address() -> serde_json::Value {
    json!({
        "firstName": "Ada",
        "lastName": "Lovelace",
        "address": "1 Analytical Way",
        "city": "London",
        "state": "LDN",
        "zipCode": "12345",
        "country": "GB"
    })
}

#[tokio::test]
async fn completed_event_materializes_order() {
    let app = TestApp::new().await;
    let payload = completed_checkout_event(
        "cs_test_a",
        "pi_test_a",
        4998,
        "ada@example.com",
        two_line_items(Uuid::new_v4(), Uuid::new_v4()),
        Some(ada_address()),
    );

    let response = app.post_signed_webhook(&payload).await;

    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body, json!({"received": true}));

    let orders = app
        .state
        .services
        .orders
        .list_orders(1, 10, None)
        .await
        .expect("list orders");
    assert_eq!(orders.total, 1);

    let order = &orders.orders[0];
    assert_eq!(order.total, dec!(49.98));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_intent_id, "pi_test_a");
    // No auth directory is configured, so the purchaser stays unresolved.
    assert_eq!(order.customer_id, None);
    assert_eq!(
        order.shipping_address,
        "Ada Lovelace\n1 Analytical Way\nLondon, LDN 12345\nGB"
    );

    let detail = app
        .state
        .services
        .orders
        .get_order(order.id)
        .await
        .expect("get order")
        .expect("order detail");
    assert_eq!(detail.items.len(), 2);
    let quantities: Vec<i32> = detail.items.iter().map(|i| i.quantity).collect();
    assert!(quantities.contains(&2) && quantities.contains(&1));
}

#[tokio::test]
async fn settled_amount_becomes_the_order_total() {
    let app = TestApp::new().await;
    // A single line of 2 x $20 settles at 4000 minor units. The stored
    // total divides the settled amount; the item row snapshots the line.
    let payload = completed_checkout_event(
        "cs_test_single",
        "pi_test_single",
        4000,
        "ada@example.com",
        json!([{"productId": Uuid::new_v4(), "productName": "Logo Tee", "quantity": 2, "price": 20}]),
        Some(ada_address()),
    );

    let response = app.post_signed_webhook(&payload).await;
    assert_eq!(response.status(), 200);

    let orders = app
        .state
        .services
        .orders
        .list_orders(1, 10, None)
        .await
        .expect("list orders");
    assert_eq!(orders.total, 1);
    let order = &orders.orders[0];
    assert_eq!(order.payment_intent_id, "pi_test_single");
    assert_eq!(order.total, dec!(40.00));

    let detail = app
        .state
        .services
        .orders
        .get_order(order.id)
        .await
        .expect("get order")
        .expect("order detail");
    assert_eq!(detail.items.len(), 1);
    assert_eq!(detail.items[0].quantity, 2);
    assert_eq!(detail.items[0].price, dec!(20));
}

#[tokio::test]
async fn duplicate_delivery_records_one_order() {
    let app = TestApp::new().await;
    let payload = completed_checkout_event(
        "cs_test_dup",
        "pi_test_dup",
        2000,
        "ada@example.com",
        json!([{"productId": Uuid::new_v4(), "productName": "Logo Tee", "quantity": 1, "price": 20}]),
        Some(ada_address()),
    );

    let first = app.post_signed_webhook(&payload).await;
    assert_eq!(first.status(), 200);

    // The gateway retries with the same event; the replay must ack without
    // writing a second order.
    let second = app.post_signed_webhook(&payload).await;
    assert_eq!(second.status(), 200);
    assert_eq!(response_json(second).await, json!({"received": true}));

    let orders = app
        .state
        .services
        .orders
        .list_orders(1, 10, None)
        .await
        .expect("list orders");
    assert_eq!(orders.total, 1);
}

#[tokio::test]
async fn wrong_secret_is_rejected_before_any_write() {
    let app = TestApp::new().await;
    let payload = completed_checkout_event(
        "cs_test_forged",
        "pi_test_forged",
        2000,
        "mallory@example.com",
        json!([{"productId": Uuid::new_v4(), "productName": "Logo Tee", "quantity": 1, "price": 20}]),
        None,
    );

    let forged = signature_header("whsec_wrong_secret", Utc::now().timestamp(), &payload);
    let response = app.post_webhook(&payload, Some(&forged)).await;

    assert_eq!(response.status(), 401);
    let body = response_json(response).await;
    assert_eq!(body["message"], "Invalid signature");

    let orders = app
        .state
        .services
        .orders
        .list_orders(1, 10, None)
        .await
        .expect("list orders");
    assert_eq!(orders.total, 0);
}

#[tokio::test]
async fn missing_signature_header_is_bad_request() {
    let app = TestApp::new().await;
    let payload = completed_checkout_event(
        "cs_test_unsigned",
        "pi_test_unsigned",
        2000,
        "ada@example.com",
        json!([{"productId": Uuid::new_v4(), "productName": "Logo Tee", "quantity": 1, "price": 20}]),
        None,
    );

    let response = app.post_webhook(&payload, None).await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn stale_timestamp_is_unauthorized() {
    let app = TestApp::new().await;
    let payload = completed_checkout_event(
        "cs_test_stale",
        "pi_test_stale",
        2000,
        "ada@example.com",
        json!([{"productId": Uuid::new_v4(), "productName": "Logo Tee", "quantity": 1, "price": 20}]),
        None,
    );

    // Correct secret, but signed an hour ago; replay protection rejects it.
    let stale = signature_header(
        TEST_WEBHOOK_SECRET,
        Utc::now().timestamp() - 3600,
        &payload,
    );
    let response = app.post_webhook(&payload, Some(&stale)).await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn unrelated_event_kinds_are_acknowledged_without_orders() {
    let app = TestApp::new().await;
    let payload = serde_json::to_vec(&json!({
        "id": "evt_pi_1",
        "type": "payment_intent.succeeded",
        "data": { "object": { "id": "pi_other", "amount": 500 } }
    }))
    .expect("serialize event");

    let response = app.post_signed_webhook(&payload).await;

    assert_eq!(response.status(), 200);
    assert_eq!(response_json(response).await, json!({"received": true}));

    let orders = app
        .state
        .services
        .orders
        .list_orders(1, 10, None)
        .await
        .expect("list orders");
    assert_eq!(orders.total, 0);
}

#[tokio::test]
async fn malformed_order_items_metadata_is_bad_request() {
    let app = TestApp::new().await;
    let payload = serde_json::to_vec(&json!({
        "id": "evt_bad_meta",
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": "cs_bad_meta",
                "payment_intent": "pi_bad_meta",
                "amount_total": 2000,
                "customer_email": "ada@example.com",
                "metadata": { "orderItems": "not json", "schemaVersion": "1" }
            }
        }
    }))
    .expect("serialize event");

    let response = app.post_signed_webhook(&payload).await;
    assert_eq!(response.status(), 400);

    let orders = app
        .state
        .services
        .orders
        .list_orders(1, 10, None)
        .await
        .expect("list orders");
    assert_eq!(orders.total, 0);
}

#[tokio::test]
async fn missing_customer_email_is_bad_request() {
    let app = TestApp::new().await;
    let payload = serde_json::to_vec(&json!({
        "id": "evt_no_email",
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": "cs_no_email",
                "payment_intent": "pi_no_email",
                "amount_total": 2000,
                "metadata": {
                    "orderItems": json!([{
                        "productId": Uuid::new_v4(),
                        "productName": "Logo Tee",
                        "quantity": 1,
                        "price": 20
                    }]).to_string(),
                    "schemaVersion": "1"
                }
            }
        }
    }))
    .expect("serialize event");

    let response = app.post_signed_webhook(&payload).await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert_eq!(body["message"], "No customer email found");
}

#[tokio::test]
async fn purchaser_is_resolved_through_auth_directory() {
    let directory = MockServer::start().await;
    let user_id = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path("/admin/users"))
        .and(header("authorization", "Bearer svc_key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [{"id": user_id, "email": "Ada@Example.com"}]
        })))
        .mount(&directory)
        .await;

    let app = TestApp::with_config(|cfg| {
        cfg.auth_admin_url = Some(directory.uri());
        cfg.auth_service_key = Some("svc_key".to_string());
    })
    .await;

    let payload = completed_checkout_event(
        "cs_test_dir",
        "pi_test_dir",
        2000,
        "ada@example.com",
        json!([{"productId": Uuid::new_v4(), "productName": "Logo Tee", "quantity": 1, "price": 20}]),
        Some(ada_address()),
    );

    let response = app.post_signed_webhook(&payload).await;
    assert_eq!(response.status(), 200);

    let orders = app
        .state
        .services
        .orders
        .list_orders(1, 10, None)
        .await
        .expect("list orders");
    assert_eq!(orders.total, 1);
    assert_eq!(orders.orders[0].customer_id, Some(user_id));

    // The resolved purchaser also gains a local customer row.
    let customer = app
        .state
        .services
        .customers
        .find_by_email("ada@example.com")
        .await
        .expect("query customer")
        .expect("customer row");
    assert_eq!(customer.id, user_id);
}

#[tokio::test]
async fn directory_failure_still_records_the_order() {
    let directory = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/users"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&directory)
        .await;

    let app = TestApp::with_config(|cfg| {
        cfg.auth_admin_url = Some(directory.uri());
        cfg.auth_service_key = Some("svc_key".to_string());
    })
    .await;

    let payload = completed_checkout_event(
        "cs_test_dir_down",
        "pi_test_dir_down",
        2000,
        "ada@example.com",
        json!([{"productId": Uuid::new_v4(), "productName": "Logo Tee", "quantity": 1, "price": 20}]),
        None,
    );

    let response = app.post_signed_webhook(&payload).await;

    // Purchaser resolution is best-effort; the order lands without it.
    assert_eq!(response.status(), 200);
    let orders = app
        .state
        .services
        .orders
        .list_orders(1, 10, None)
        .await
        .expect("list orders");
    assert_eq!(orders.total, 1);
    assert_eq!(orders.orders[0].customer_id, None);
    assert_eq!(orders.orders[0].shipping_address, "No shipping address provided");
}
