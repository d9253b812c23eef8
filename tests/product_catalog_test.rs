//! Integration tests for the product catalog.
//!
//! The read surface is public; creates, updates and deletes sit behind the
//! bearer admin token. Covers the token gate, validation, partial updates,
//! and listing filters with pagination.

mod common;

use axum::http::Method;
use common::{decimal, response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;

fn tee_payload() -> Value {
    json!({
        "name": "Organic Cotton Tee",
        "description": "Soft, breathable, everyday tee",
        "price": "25.00",
        "sale_price": "19.99",
        "image_url": "https://cdn.example.com/tee.png",
        "category": "apparel",
        "stock": 120,
        "is_featured": false
    })
}

async fn create_product(app: &TestApp, payload: Value) -> Value {
    let response = app
        .admin_request(Method::POST, "/api/v1/products", Some(payload))
        .await;
    assert_eq!(response.status(), 201);
    response_json(response).await
}

#[tokio::test]
async fn mutations_require_the_admin_token() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::POST, "/api/v1/products", Some(tee_payload()), None)
        .await;
    assert_eq!(response.status(), 401);
    let body = response_json(response).await;
    assert_eq!(body["message"], "Invalid admin token");

    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(tee_payload()),
            Some("not-the-token"),
        )
        .await;
    assert_eq!(response.status(), 401);

    let uri = format!("/api/v1/products/{}", Uuid::new_v4());
    let response = app
        .request(Method::DELETE, &uri, None, Some("not-the-token"))
        .await;
    assert_eq!(response.status(), 401);

    // Reads stay public.
    let response = app.request(Method::GET, "/api/v1/products", None, None).await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn admin_surface_is_disabled_without_a_configured_token() {
    let app = TestApp::with_config(|cfg| {
        cfg.admin_api_token = None;
    })
    .await;

    let response = app
        .admin_request(Method::POST, "/api/v1/products", Some(tee_payload()))
        .await;
    assert_eq!(response.status(), 401);
    let body = response_json(response).await;
    assert_eq!(body["message"], "Admin API is not enabled");
}

#[tokio::test]
async fn admin_creates_a_product_the_storefront_can_read() {
    let app = TestApp::new().await;

    let body = create_product(&app, tee_payload()).await;
    assert_eq!(body["success"], json!(true));

    let data = &body["data"];
    assert_eq!(data["name"], "Organic Cotton Tee");
    assert_eq!(decimal(&data["price"]), dec!(25));
    assert_eq!(decimal(&data["sale_price"]), dec!(19.99));
    assert_eq!(data["stock"], json!(120));
    assert!(data["updated_at"].is_null());

    let id = data["id"].as_str().expect("product id");
    let response = app
        .request(Method::GET, &format!("/api/v1/products/{id}"), None, None)
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["data"]["name"], "Organic Cotton Tee");
}

#[tokio::test]
async fn create_rejects_bad_input() {
    let app = TestApp::new().await;

    let mut negative_price = tee_payload();
    negative_price["price"] = json!("-1.00");
    let response = app
        .admin_request(Method::POST, "/api/v1/products", Some(negative_price))
        .await;
    assert_eq!(response.status(), 400);

    let mut negative_stock = tee_payload();
    negative_stock["stock"] = json!(-5);
    let response = app
        .admin_request(Method::POST, "/api/v1/products", Some(negative_stock))
        .await;
    assert_eq!(response.status(), 400);

    let mut blank_name = tee_payload();
    blank_name["name"] = json!("");
    let response = app
        .admin_request(Method::POST, "/api/v1/products", Some(blank_name))
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn update_changes_only_the_sent_fields() {
    let app = TestApp::new().await;
    let created = create_product(&app, tee_payload()).await;
    let id = created["data"]["id"].as_str().expect("product id");

    let response = app
        .admin_request(
            Method::PUT,
            &format!("/api/v1/products/{id}"),
            Some(json!({ "price": "18.50", "stock": 7 })),
        )
        .await;
    assert_eq!(response.status(), 200);

    let body = response_json(response).await;
    let data = &body["data"];
    assert_eq!(decimal(&data["price"]), dec!(18.50));
    assert_eq!(data["stock"], json!(7));
    // Untouched fields keep their values, and the update is timestamped.
    assert_eq!(data["name"], "Organic Cotton Tee");
    assert_eq!(decimal(&data["sale_price"]), dec!(19.99));
    assert!(!data["updated_at"].is_null());
}

#[tokio::test]
async fn update_of_unknown_product_is_not_found() {
    let app = TestApp::new().await;

    let response = app
        .admin_request(
            Method::PUT,
            &format!("/api/v1/products/{}", Uuid::new_v4()),
            Some(json!({ "price": "1.00" })),
        )
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn listing_filters_by_category_and_featured() {
    let app = TestApp::new().await;

    let mut cap = tee_payload();
    cap["name"] = json!("Cap");
    let mut poster = tee_payload();
    poster["name"] = json!("Gallery Poster");
    poster["category"] = json!("art");
    poster["is_featured"] = json!(true);

    create_product(&app, tee_payload()).await;
    create_product(&app, cap).await;
    create_product(&app, poster).await;

    let body = response_json(
        app.request(Method::GET, "/api/v1/products", None, None).await,
    )
    .await;
    assert_eq!(body["data"]["total"], json!(3));

    let body = response_json(
        app.request(Method::GET, "/api/v1/products?category=apparel", None, None)
            .await,
    )
    .await;
    assert_eq!(body["data"]["total"], json!(2));

    let body = response_json(
        app.request(Method::GET, "/api/v1/products?featured=true", None, None)
            .await,
    )
    .await;
    assert_eq!(body["data"]["total"], json!(1));
    assert_eq!(body["data"]["products"][0]["name"], "Gallery Poster");
}

#[tokio::test]
async fn listing_paginates_newest_first() {
    let app = TestApp::new().await;

    for name in ["First", "Second", "Third"] {
        let mut payload = tee_payload();
        payload["name"] = json!(name);
        create_product(&app, payload).await;
        // Keep created_at strictly increasing for a stable sort.
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let body = response_json(
        app.request(
            Method::GET,
            "/api/v1/products?per_page=2&page=1",
            None,
            None,
        )
        .await,
    )
    .await;
    let data = &body["data"];
    assert_eq!(data["total"], json!(3));
    assert_eq!(data["page"], json!(1));
    assert_eq!(data["per_page"], json!(2));
    assert_eq!(data["products"][0]["name"], "Third");
    assert_eq!(data["products"][1]["name"], "Second");

    let body = response_json(
        app.request(
            Method::GET,
            "/api/v1/products?per_page=2&page=2",
            None,
            None,
        )
        .await,
    )
    .await;
    let products = body["data"]["products"].as_array().expect("products page");
    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["name"], "First");
}

#[tokio::test]
async fn delete_removes_the_product() {
    let app = TestApp::new().await;
    let created = create_product(&app, tee_payload()).await;
    let id = created["data"]["id"].as_str().expect("product id").to_string();

    let response = app
        .admin_request(Method::DELETE, &format!("/api/v1/products/{id}"), None)
        .await;
    assert_eq!(response.status(), 204);

    let response = app
        .request(Method::GET, &format!("/api/v1/products/{id}"), None, None)
        .await;
    assert_eq!(response.status(), 404);

    // A second delete has nothing left to remove.
    let response = app
        .admin_request(Method::DELETE, &format!("/api/v1/products/{id}"), None)
        .await;
    assert_eq!(response.status(), 404);
}
