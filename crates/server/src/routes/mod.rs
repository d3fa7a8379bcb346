//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                        - Liveness check
//! GET  /health/ready                  - Readiness check (database ping)
//!
//! # Chat
//! POST /api/chat                      - Run one conversation turn
//!
//! # Products
//! GET    /api/products                - List products (newest first)
//! POST   /api/products                - Create product
//! GET    /api/products/{id}           - Product detail
//! PATCH  /api/products/{id}           - Partial update
//! DELETE /api/products/{id}           - Delete (returns the deleted product)
//!
//! # Orders
//! GET   /api/orders                   - List orders (?status=&email= filters)
//! POST  /api/orders                   - Create order (by product ID)
//! GET   /api/orders/{id}              - Order detail with lines
//! PATCH /api/orders/{id}/status       - Update order status
//! GET   /api/orders/customer/{email}  - One customer's orders
//!
//! # Company settings
//! GET  /api/company/settings          - Current persona settings
//! POST /api/company/settings          - Create (409 when one exists)
//! PUT  /api/company/settings          - Update (404 when none exists)
//!
//! # Admin
//! GET  /api/admin/stats               - Dashboard aggregates
//! ```

pub mod chat;
pub mod health;
pub mod orders;
pub mod persona;
pub mod products;
pub mod stats;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::state::AppState;

/// Create the `/api` routes router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/chat", post(chat::chat))
        .route(
            "/products",
            get(products::list_products).post(products::create_product),
        )
        .route(
            "/products/{id}",
            get(products::get_product)
                .patch(products::update_product)
                .delete(products::delete_product),
        )
        .route("/orders", get(orders::list_orders).post(orders::create_order))
        .route("/orders/customer/{email}", get(orders::customer_orders))
        .route("/orders/{id}", get(orders::get_order))
        .route("/orders/{id}/status", patch(orders::update_order_status))
        .route(
            "/company/settings",
            get(persona::get_settings)
                .post(persona::create_settings)
                .put(persona::update_settings),
        )
        .route("/admin/stats", get(stats::store_stats))
}

/// Create the health routes router.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
}
