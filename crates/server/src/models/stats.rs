//! Dashboard aggregates.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shoptalk_core::OrderStatus;

/// Count of orders in one status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

/// Store-wide aggregates for the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    /// Number of products in the catalog.
    pub total_products: i64,
    /// Number of orders ever placed.
    pub total_orders: i64,
    /// Sum of all order totals.
    pub total_revenue: Decimal,
    /// Orders grouped by status. Statuses with zero orders are omitted.
    pub orders_by_status: Vec<StatusCount>,
    /// When the most recent order was placed, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_order_date: Option<DateTime<Utc>>,
}
