use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::product;

/// Snapshot of a catalog product carried inside a cart line. Prices are
/// copied at add time so cart arithmetic never re-reads the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProductSummary {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sale_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub stock: i32,
}

impl ProductSummary {
    /// Unit price charged at checkout: the sale price when one is set.
    pub fn effective_price(&self) -> Decimal {
        self.sale_price.unwrap_or(self.price)
    }
}

impl From<product::Model> for ProductSummary {
    fn from(model: product::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            price: model.price,
            sale_price: model.sale_price,
            image_url: model.image_url,
            stock: model.stock,
        }
    }
}

/// One cart line: a product snapshot and how many of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub product: ProductSummary,
    pub quantity: u32,
}

/// Derived cart totals. Shipping is free only when the subtotal strictly
/// exceeds the configured threshold; an empty cart ships nothing.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CartTotals {
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub item_count: u32,
}

/// In-session cart state container.
///
/// Every operation is a synchronous local state transition with no I/O.
/// Quantity bounds against stock are the caller's responsibility; the
/// container itself only guarantees that no line ever holds a
/// zero-or-negative quantity.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Adds one unit of `product`: increments the existing line if present,
    /// otherwise inserts a new line with quantity 1.
    pub fn add_item(&mut self, product: ProductSummary) {
        if let Some(item) = self.items.iter_mut().find(|i| i.product.id == product.id) {
            item.quantity += 1;
        } else {
            self.items.push(CartItem {
                product,
                quantity: 1,
            });
        }
    }

    /// Removes the line for `product_id`; no-op when absent.
    pub fn remove_item(&mut self, product_id: Uuid) {
        self.items.retain(|i| i.product.id != product_id);
    }

    /// Sets the quantity for `product_id`. Any quantity of zero or below
    /// removes the line instead; out-of-range input never panics.
    pub fn update_quantity(&mut self, product_id: Uuid, quantity: i32) {
        if quantity <= 0 {
            self.remove_item(product_id);
            return;
        }
        if let Some(item) = self.items.iter_mut().find(|i| i.product.id == product_id) {
            item.quantity = quantity as u32;
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Current quantity of a product in the cart, zero when absent.
    pub fn quantity_of(&self, product_id: Uuid) -> u32 {
        self.items
            .iter()
            .find(|i| i.product.id == product_id)
            .map(|i| i.quantity)
            .unwrap_or(0)
    }

    /// Sum of effective unit price times quantity over all lines.
    pub fn total(&self) -> Decimal {
        self.items
            .iter()
            .map(|i| i.product.effective_price() * Decimal::from(i.quantity))
            .sum()
    }

    /// Sum of quantities, shown as the cart badge.
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Shipping charged at the storefront summary: the flat fee unless the
    /// subtotal is strictly above the free-shipping threshold.
    pub fn shipping_cost(&self, free_threshold: Decimal, flat_fee: Decimal) -> Decimal {
        if self.is_empty() || self.total() > free_threshold {
            Decimal::ZERO
        } else {
            flat_fee
        }
    }

    pub fn totals(&self, free_threshold: Decimal, flat_fee: Decimal) -> CartTotals {
        let subtotal = self.total();
        let shipping = self.shipping_cost(free_threshold, flat_fee);
        CartTotals {
            subtotal,
            shipping,
            total: subtotal + shipping,
            item_count: self.item_count(),
        }
    }
}

/// Registry of per-session carts, passed through application state instead
/// of living in any global. Each entry is mutated under its shard lock, so
/// a session keeps the single-writer model even though sessions run
/// concurrently.
#[derive(Default)]
pub struct CartSessions {
    carts: DashMap<Uuid, Cart>,
}

impl CartSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new empty cart and returns its session id.
    pub fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.carts.insert(id, Cart::new());
        id
    }

    /// Clones the current cart state out of the registry.
    pub fn get(&self, id: Uuid) -> Option<Cart> {
        self.carts.get(&id).map(|entry| entry.value().clone())
    }

    /// Runs `f` against the cart under its entry lock. Returns `None` when
    /// the session does not exist.
    pub fn with_cart<T>(&self, id: Uuid, f: impl FnOnce(&mut Cart) -> T) -> Option<T> {
        self.carts.get_mut(&id).map(|mut entry| f(entry.value_mut()))
    }

    /// Drops the session entirely.
    pub fn remove(&self, id: Uuid) -> Option<Cart> {
        self.carts.remove(&id).map(|(_, cart)| cart)
    }

    pub fn len(&self) -> usize {
        self.carts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.carts.is_empty()
    }
}
