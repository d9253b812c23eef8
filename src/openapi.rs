use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

/// Registers the bearer scheme the admin endpoints reference.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "admin_token",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "0.1.0",
        description = r#"
# Storefront API

Backend for a merchandise storefront: a product catalog, per-session
shopping carts, checkout through a hosted payment gateway, and
webhook-driven order fulfillment.

## Checkout flow

1. The storefront posts cart contents to `/api/v1/checkout/session`
   (or `/api/v1/carts/{id}/checkout` for a server-held cart).
2. The customer pays on the gateway's hosted page.
3. The gateway calls `/api/v1/webhooks/stripe`; a verified
   `checkout.session.completed` event materializes the order.

## Authentication

Catalog reads, carts, checkout, and order lookups are public. Admin
endpoints require the configured token:

```
Authorization: Bearer <admin-token>
```
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Products", description = "Product catalog and admin CRUD"),
        (name = "Carts", description = "Session cart state"),
        (name = "Checkout", description = "Hosted payment session creation"),
        (name = "Orders", description = "Order history and fulfillment status"),
        (name = "Customers", description = "Auth-provider shadow identities"),
        (name = "Webhooks", description = "Payment gateway callbacks")
    ),
    paths(
        // Products
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::create_product,
        crate::handlers::products::update_product,
        crate::handlers::products::delete_product,

        // Carts
        crate::handlers::carts::create_cart,
        crate::handlers::carts::get_cart,
        crate::handlers::carts::add_cart_item,
        crate::handlers::carts::update_cart_item,
        crate::handlers::carts::remove_cart_item,
        crate::handlers::carts::delete_cart,
        crate::handlers::carts::checkout_cart,

        // Checkout
        crate::handlers::checkout::create_checkout_session,

        // Orders
        crate::handlers::orders::list_customer_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::list_all_orders,
        crate::handlers::orders::update_order_status,

        // Customers
        crate::handlers::customers::create_customer,
        crate::handlers::customers::get_customer,

        // Webhooks
        crate::handlers::webhooks::gateway_webhook,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,
            crate::errors::ErrorResponse,

            // Catalog types
            crate::services::catalog::ProductResponse,
            crate::services::catalog::ProductListResponse,
            crate::services::catalog::CreateProductRequest,
            crate::services::catalog::UpdateProductRequest,

            // Cart types
            crate::cart::ProductSummary,
            crate::cart::CartItem,
            crate::cart::CartTotals,
            crate::handlers::carts::CartView,
            crate::handlers::carts::AddCartItemRequest,
            crate::handlers::carts::UpdateCartItemRequest,
            crate::handlers::carts::CartCheckoutRequest,

            // Checkout types
            crate::services::checkout::CreateCheckoutSessionRequest,
            crate::services::checkout::CheckoutSessionResponse,
            crate::payments::intent::ShippingAddress,
            crate::payments::intent::IntentLineItem,

            // Order types
            crate::entities::order::OrderStatus,
            crate::services::orders::OrderResponse,
            crate::services::orders::OrderItemResponse,
            crate::services::orders::OrderDetailResponse,
            crate::services::orders::OrderListResponse,
            crate::services::orders::UpdateOrderStatusRequest,

            // Customer types
            crate::services::customers::CreateCustomerRequest,
            crate::services::customers::CustomerResponse,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
