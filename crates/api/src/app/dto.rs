//! Request bodies and response shaping for the HTTP surface.

use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use shopforge_inventory::MovementType;
use shopforge_orders::{Cart, OrderStatus};

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub price_cents: u64,
    #[serde(default)]
    pub cost_cents: u64,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub threshold: u64,
    #[serde(default)]
    pub initial_stock: u64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub rating: Option<f64>,
    pub featured: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePriceRequest {
    pub price_cents: u64,
    #[serde(default)]
    pub cost_cents: u64,
}

#[derive(Debug, Deserialize)]
pub struct RecordMovementRequest {
    pub movement_type: MovementType,
    pub quantity: u64,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct SetThresholdRequest {
    pub threshold: u64,
}

#[derive(Debug, Deserialize)]
pub struct AddCartItemRequest {
    pub sku: String,
    pub quantity: u64,
}

#[derive(Debug, Deserialize)]
pub struct SetCartQuantityRequest {
    pub quantity: u64,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmCheckoutRequest {
    pub payment_reference: String,
}

#[derive(Debug, Deserialize)]
pub struct OrderLineRequest {
    pub sku: String,
    pub quantity: u64,
}

/// Direct order creation. Either `lines` or the legacy single-item
/// `sku`/`quantity` pair must be present.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    /// Token subject of the customer the order is placed for.
    pub customer: String,
    #[serde(default)]
    pub lines: Vec<OrderLineRequest>,
    pub sku: Option<String>,
    pub quantity: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

/// Sale recording. Either `order_id` (sale for a placed order) or `lines`
/// (manual sale, decrements stock) must be present.
#[derive(Debug, Deserialize)]
pub struct RecordSaleRequest {
    pub order_id: Option<String>,
    #[serde(default)]
    pub lines: Vec<OrderLineRequest>,
}

pub fn cart_to_json(cart: &Cart) -> JsonValue {
    json!({
        "customer_id": cart.customer_id(),
        "lines": cart.lines(),
        "subtotal_cents": cart.subtotal_cents(),
        "total_quantity": cart.total_quantity(),
        "updated_at": cart.updated_at(),
    })
}
