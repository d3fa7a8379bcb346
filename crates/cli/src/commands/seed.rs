//! Demo catalog seed command.

use rust_decimal::Decimal;
use tracing::info;

use shoptalk_server::db::{self, ProductRepository};
use shoptalk_server::models::NewProduct;

/// The demo catalog: (name, description, price, stock, category).
const DEMO_CATALOG: [(&str, &str, &str, i64, &str); 10] = [
    (
        "MacBook Pro M2",
        "Apple laptop with the M2 chip, 13-inch Retina display, 8 GB RAM and 256 GB SSD.",
        "1299.00",
        5,
        "Laptops",
    ),
    (
        "Logitech MX Master 3",
        "Wireless ergonomic mouse with MagSpeed scrolling and USB-C quick charge.",
        "99.00",
        12,
        "Accessories",
    ),
    (
        "iPhone 14",
        "Apple smartphone with a 6.1-inch Super Retina XDR display and dual camera.",
        "899.00",
        8,
        "Smartphones",
    ),
    (
        "Samsung Galaxy S23",
        "Samsung flagship with a 6.1-inch Dynamic AMOLED display and triple camera.",
        "1099.00",
        6,
        "Smartphones",
    ),
    (
        "Dell XPS 13",
        "Compact 13-inch ultrabook with InfinityEdge display, Intel Core i7 and 16 GB RAM.",
        "1399.00",
        4,
        "Laptops",
    ),
    (
        "LG UltraFine 27\"",
        "27-inch 4K UHD IPS monitor with HDR10 and USB-C connectivity.",
        "349.00",
        9,
        "Monitors",
    ),
    (
        "Keychron K2",
        "Compact 75% wireless mechanical keyboard with hot-swappable switches.",
        "85.00",
        15,
        "Accessories",
    ),
    (
        "iPad Air 5",
        "Apple tablet with the M1 chip and a 10.9-inch Liquid Retina display.",
        "649.00",
        7,
        "Tablets",
    ),
    (
        "Bose QC45",
        "Wireless noise-cancelling over-ear headphones with 24-hour battery life.",
        "329.00",
        10,
        "Audio",
    ),
    (
        "Sony WH-1000XM5",
        "Industry-leading noise-cancelling wireless headphones with 30-hour battery.",
        "379.00",
        5,
        "Audio",
    ),
];

/// Replace the product catalog with the demo catalog.
///
/// Runs migrations first so the command works against a fresh database.
///
/// # Errors
///
/// Returns an error if the database is unreachable or an insert fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let database_url = super::database_url();

    let pool = db::create_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    let products = ProductRepository::new(pool);

    let existing = products.list().await?;
    for product in &existing {
        products.delete(product.id).await?;
    }
    if !existing.is_empty() {
        info!(removed = existing.len(), "Cleared existing catalog");
    }

    for (name, description, price, stock, category) in DEMO_CATALOG {
        let product = products
            .create(&NewProduct {
                name: name.to_string(),
                description: description.to_string(),
                price: price.parse::<Decimal>()?,
                stock,
                category: category.to_string(),
                image_url: None,
            })
            .await?;
        info!(name = %product.name, price = %product.price, stock = product.stock, "Seeded product");
    }

    info!(count = DEMO_CATALOG.len(), "Seed complete");
    Ok(())
}
