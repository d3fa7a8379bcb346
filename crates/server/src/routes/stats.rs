//! Admin dashboard aggregates route.

use axum::{Json, extract::State};

use crate::error::AppError;
use crate::models::StoreStats;
use crate::state::AppState;

/// Store-wide aggregates for the admin dashboard.
///
/// GET /api/admin/stats
///
/// # Errors
///
/// Returns `AppError` on storage failure.
pub async fn store_stats(State(state): State<AppState>) -> Result<Json<StoreStats>, AppError> {
    let total_products = state.products().count().await?;
    let orders = state.orders().aggregates().await?;

    Ok(Json(StoreStats {
        total_products,
        total_orders: orders.total_orders,
        total_revenue: orders.total_revenue,
        orders_by_status: orders.by_status,
        last_order_date: orders.last_order_date,
    }))
}
