//! Order and order line models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shoptalk_core::{Email, OrderId, OrderLineId, OrderStatus, ProductId};

/// A customer order with its lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Unique order ID.
    pub id: OrderId,
    /// Human-facing order number (`ORD-...`). Unique.
    pub order_number: String,
    /// Customer the order belongs to.
    pub customer_email: Email,
    /// Total captured at creation time. Never recomputed.
    pub total_amount: Decimal,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// When the order was placed.
    pub created_at: DateTime<Utc>,
    /// The order's lines.
    pub items: Vec<OrderLine>,
}

/// One product line of an order.
///
/// `product_id` is a weak reference: the product may have been deleted since
/// the order was placed. Quantity and unit price are captured here so history
/// survives catalog changes; `product_name` is resolved at read time and is
/// `None` for deleted products.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    /// Unique line ID.
    pub id: OrderLineId,
    /// Owning order.
    pub order_id: OrderId,
    /// Product this line was priced from.
    pub product_id: ProductId,
    /// Units ordered. Always positive.
    pub quantity: u32,
    /// Unit price at order time.
    pub unit_price: Decimal,
    /// Product name at read time, if the product still exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
}

impl OrderLine {
    /// Display name for rendering, tolerating deleted products.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.product_name.as_deref().unwrap_or("(deleted product)")
    }
}
