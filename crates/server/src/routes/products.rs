//! Product catalog routes.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rust_decimal::Decimal;

use shoptalk_core::ProductId;

use crate::db::RepositoryError;
use crate::error::AppError;
use crate::models::{NewProduct, Product, ProductPatch};
use crate::state::AppState;

/// List all products, newest first.
///
/// GET /api/products
///
/// # Errors
///
/// Returns `AppError` on storage failure.
pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<Product>>, AppError> {
    let products = state.products().list().await?;
    Ok(Json(products))
}

/// Create a product.
///
/// POST /api/products
///
/// # Errors
///
/// Returns `AppError::Validation` for empty text fields, a non-positive
/// price, or negative stock.
pub async fn create_product(
    State(state): State<AppState>,
    Json(body): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    validate_text_fields(
        Some(&body.name),
        Some(&body.description),
        Some(&body.category),
    )?;
    validate_price(Some(body.price))?;
    if body.stock < 0 {
        return Err(AppError::Validation("stock must not be negative".to_string()));
    }

    let product = state.products().create(&body).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// Fetch one product.
///
/// GET /api/products/{id}
///
/// # Errors
///
/// Returns `AppError::NotFound` when the product does not exist.
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>, AppError> {
    let product = state
        .products()
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;
    Ok(Json(product))
}

/// Partially update a product.
///
/// PATCH /api/products/{id}
///
/// # Errors
///
/// Returns `AppError::Validation` for invalid fields and
/// `AppError::NotFound` when the product does not exist.
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(patch): Json<ProductPatch>,
) -> Result<Json<Product>, AppError> {
    validate_text_fields(
        patch.name.as_deref(),
        patch.description.as_deref(),
        patch.category.as_deref(),
    )?;
    validate_price(patch.price)?;
    if matches!(patch.stock, Some(stock) if stock < 0) {
        return Err(AppError::Validation("stock must not be negative".to_string()));
    }

    let product = state.products().update(id, &patch).await.map_err(|e| match e {
        RepositoryError::NotFound => AppError::NotFound(format!("product {id}")),
        other => other.into(),
    })?;
    Ok(Json(product))
}

/// Delete a product and return the deleted row.
///
/// DELETE /api/products/{id}
///
/// Historical order lines keep their captured name and price; the line's
/// product reference simply stops resolving.
///
/// # Errors
///
/// Returns `AppError::NotFound` when the product does not exist.
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>, AppError> {
    let product = state.products().delete(id).await.map_err(|e| match e {
        RepositoryError::NotFound => AppError::NotFound(format!("product {id}")),
        other => other.into(),
    })?;
    Ok(Json(product))
}

fn validate_text_fields(
    name: Option<&str>,
    description: Option<&str>,
    category: Option<&str>,
) -> Result<(), AppError> {
    for (field, value) in [
        ("name", name),
        ("description", description),
        ("category", category),
    ] {
        if matches!(value, Some(v) if v.trim().is_empty()) {
            return Err(AppError::Validation(format!("{field} must not be empty")));
        }
    }
    Ok(())
}

fn validate_price(price: Option<Decimal>) -> Result<(), AppError> {
    if matches!(price, Some(p) if p <= Decimal::ZERO) {
        return Err(AppError::Validation("price must be positive".to_string()));
    }
    Ok(())
}
