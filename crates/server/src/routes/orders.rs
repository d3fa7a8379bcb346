//! Order routes.
//!
//! Order creation goes through the fulfillment engine, the same path the
//! `createOrder` chat tool uses.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use shoptalk_core::{OrderId, OrderStatus};

use crate::db::RepositoryError;
use crate::error::AppError;
use crate::models::Order;
use crate::services::{OrderLineRequest, ProductRef};
use crate::state::AppState;

/// Query filters for the order list.
#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersQuery {
    /// Status filter (e.g., `PENDING`).
    pub status: Option<String>,
    /// Customer email filter.
    pub email: Option<String>,
}

/// Body for creating an order over REST.
///
/// Quantities arrive loosely typed and are validated here so a bad value is
/// a 400, not a deserialization rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub customer_email: String,
    pub items: Vec<CreateOrderItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderItem {
    pub product_id: String,
    pub quantity: i64,
}

/// Body for updating an order's status.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// List orders, newest first, optionally filtered by status and email.
///
/// GET /api/orders?status=&email=
///
/// # Errors
///
/// Returns `AppError::Validation` for an unknown status value.
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<OrderStatus>)
        .transpose()
        .map_err(AppError::Validation)?;

    let orders = state.orders().list(status, query.email.as_deref()).await?;
    Ok(Json(orders))
}

/// Create an order from product IDs.
///
/// POST /api/orders
///
/// # Errors
///
/// Returns `AppError::Validation` for malformed items, `AppError::NotFound`
/// for an unknown product, and `AppError::InsufficientStock` when stock does
/// not cover a line.
pub async fn create_order(
    State(state): State<AppState>,
    Json(body): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let mut lines = Vec::with_capacity(body.items.len());
    for item in &body.items {
        let id = item.product_id.parse().map_err(|_| {
            AppError::Validation(format!("productId is not a valid UUID: {}", item.product_id))
        })?;
        let quantity = u32::try_from(item.quantity).ok().filter(|q| *q > 0).ok_or_else(|| {
            AppError::Validation("quantity must be a positive integer".to_string())
        })?;
        lines.push(OrderLineRequest {
            product: ProductRef::Id(id),
            quantity,
        });
    }

    let order = state
        .fulfillment()
        .place_order(&body.customer_email, &lines)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Fetch one order with its lines.
///
/// GET /api/orders/{id}
///
/// # Errors
///
/// Returns `AppError::NotFound` when the order does not exist.
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .orders()
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;
    Ok(Json(order))
}

/// Update an order's status.
///
/// PATCH /api/orders/{id}/status
///
/// Any status may be assigned from any status; the permissive transition
/// model is deliberate.
///
/// # Errors
///
/// Returns `AppError::Validation` for an unknown status and
/// `AppError::NotFound` when the order does not exist.
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<Order>, AppError> {
    let status = body
        .status
        .parse::<OrderStatus>()
        .map_err(AppError::Validation)?;

    let order = state.orders().update_status(id, status).await.map_err(|e| match e {
        RepositoryError::NotFound => AppError::NotFound(format!("order {id}")),
        other => other.into(),
    })?;
    Ok(Json(order))
}

/// List one customer's orders, newest first.
///
/// GET /api/orders/customer/{email}
///
/// An unknown email yields an empty list, not an error.
///
/// # Errors
///
/// Returns `AppError` on storage failure.
pub async fn customer_orders(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<Vec<Order>>, AppError> {
    let orders = state.orders().find_by_email(&email, None).await?;
    Ok(Json(orders))
}
