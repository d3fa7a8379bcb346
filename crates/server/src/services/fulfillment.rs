//! Order fulfillment engine.
//!
//! The single order-creation path. The REST endpoint resolves products by ID,
//! the `createOrder` tool by exact name; both feed
//! [`FulfillmentEngine::place_order`], so stock rules cannot drift between
//! surfaces.
//!
//! Invariants:
//! - every line is validated before any stock changes;
//! - stock is decremented with a conditional `UPDATE ... WHERE stock >= ?`
//!   inside one immediate (write) transaction, so concurrent orders queue
//!   on the write lock and can never oversell;
//! - the whole order commits or none of it does (dropping the transaction
//!   rolls back any decrements already applied).

use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;

use shoptalk_core::{Email, OrderId, OrderLineId, OrderStatus, ProductId};

use crate::db::RepositoryError;
use crate::models::{Order, OrderLine};

/// How a caller refers to a product in an order line.
#[derive(Debug, Clone)]
pub enum ProductRef {
    /// By ID (REST surface).
    Id(ProductId),
    /// By exact name, case-insensitive (conversational surface).
    Name(String),
}

impl ProductRef {
    /// The caller-facing label used in error messages.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Id(id) => id.to_string(),
            Self::Name(name) => name.clone(),
        }
    }
}

/// One requested line of a new order.
#[derive(Debug, Clone)]
pub struct OrderLineRequest {
    pub product: ProductRef,
    pub quantity: u32,
}

/// Errors from order placement.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The request itself is malformed.
    #[error("{0}")]
    Validation(String),

    /// A line referenced a product that does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// A line asked for more units than are available.
    #[error("Insufficient stock for {0}")]
    InsufficientStock(String),

    /// Storage failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// The order fulfillment engine.
#[derive(Clone)]
pub struct FulfillmentEngine {
    pool: SqlitePool,
}

/// A product row snapshotted inside the order transaction.
struct ResolvedProduct {
    id: ProductId,
    name: String,
    price: Decimal,
    stock: i64,
}

impl FulfillmentEngine {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Place an order.
    ///
    /// Validates every line (existence, then stock, in input order - the
    /// first failing line aborts the whole order), prices each line at the
    /// product's current price, computes the total once, decrements stock
    /// conditionally, and inserts the order with all its lines. New orders
    /// start [`OrderStatus::Pending`].
    ///
    /// # Errors
    ///
    /// - [`OrderError::Validation`] for a bad email, empty item list, or
    ///   non-positive quantity;
    /// - [`OrderError::ProductNotFound`] / [`OrderError::InsufficientStock`]
    ///   for the first failing line;
    /// - [`OrderError::Repository`] for storage failures (including an
    ///   order-number collision, surfaced as a conflict).
    pub async fn place_order(
        &self,
        customer_email: &str,
        lines: &[OrderLineRequest],
    ) -> Result<Order, OrderError> {
        let email = Email::parse(customer_email)
            .map_err(|e| OrderError::Validation(format!("customerEmail: {e}")))?;

        if lines.is_empty() {
            return Err(OrderError::Validation(
                "order must contain at least one item".to_string(),
            ));
        }
        if lines.iter().any(|line| line.quantity == 0) {
            return Err(OrderError::Validation(
                "quantity must be a positive integer".to_string(),
            ));
        }

        // The transaction reads stock before writing it, and SQLite fails a
        // deferred read-to-write upgrade with SQLITE_BUSY without waiting on
        // busy_timeout. Begin as a writer so concurrent checkouts queue.
        let mut tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(RepositoryError::from)?;

        // Pass 1: resolve and validate every line before touching stock.
        let mut resolved: Vec<(ResolvedProduct, u32)> = Vec::with_capacity(lines.len());
        for line in lines {
            let product = resolve_product(&mut tx, &line.product)
                .await?
                .ok_or_else(|| OrderError::ProductNotFound(line.product.label()))?;

            if product.stock < i64::from(line.quantity) {
                return Err(OrderError::InsufficientStock(product.name));
            }

            resolved.push((product, line.quantity));
        }

        // Total is computed exactly once, at current prices.
        let total_amount: Decimal = resolved
            .iter()
            .map(|(product, quantity)| product.price * Decimal::from(*quantity))
            .sum();

        // Pass 2: conditional decrements. Zero affected rows means a
        // concurrent order won the race since validation; dropping the
        // transaction rolls back decrements already applied.
        for (product, quantity) in &resolved {
            let result = sqlx::query(
                "UPDATE product SET stock = stock - ?1 WHERE id = ?2 AND stock >= ?1",
            )
            .bind(i64::from(*quantity))
            .bind(product.id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;

            if result.rows_affected() == 0 {
                return Err(OrderError::InsufficientStock(product.name.clone()));
            }
        }

        let order_id = OrderId::generate();
        let order_number = generate_order_number();
        let created_at = Utc::now();

        let insert = sqlx::query(
            "INSERT INTO customer_order (id, order_number, customer_email, total_amount, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(order_id.to_string())
        .bind(&order_number)
        .bind(email.as_str())
        .bind(total_amount.to_string())
        .bind(OrderStatus::Pending.as_str())
        .bind(created_at.to_rfc3339())
        .execute(&mut *tx)
        .await;

        if let Err(e) = insert {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return Err(OrderError::Repository(RepositoryError::Conflict(
                        format!("order number {order_number} already exists"),
                    )));
                }
            }
            return Err(OrderError::Repository(RepositoryError::Database(e)));
        }

        let mut items = Vec::with_capacity(resolved.len());
        for (product, quantity) in &resolved {
            let line = OrderLine {
                id: OrderLineId::generate(),
                order_id,
                product_id: product.id,
                quantity: *quantity,
                unit_price: product.price,
                product_name: Some(product.name.clone()),
            };

            sqlx::query(
                "INSERT INTO order_line (id, order_id, product_id, quantity, unit_price)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(line.id.to_string())
            .bind(line.order_id.to_string())
            .bind(line.product_id.to_string())
            .bind(i64::from(line.quantity))
            .bind(line.unit_price.to_string())
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;

            items.push(line);
        }

        tx.commit().await.map_err(RepositoryError::from)?;

        Ok(Order {
            id: order_id,
            order_number,
            customer_email: email,
            total_amount,
            status: OrderStatus::Pending,
            created_at,
            items,
        })
    }
}

/// Snapshot a product inside the order transaction.
async fn resolve_product(
    conn: &mut SqliteConnection,
    product: &ProductRef,
) -> Result<Option<ResolvedProduct>, RepositoryError> {
    use sqlx::Row;

    let row = match product {
        ProductRef::Id(id) => {
            sqlx::query("SELECT id, name, price, stock FROM product WHERE id = ?1")
                .bind(id.to_string())
                .fetch_optional(conn)
                .await?
        }
        ProductRef::Name(name) => {
            sqlx::query(
                "SELECT id, name, price, stock FROM product WHERE name = ?1 COLLATE NOCASE LIMIT 1",
            )
            .bind(name)
            .fetch_optional(conn)
            .await?
        }
    };

    let Some(row) = row else {
        return Ok(None);
    };

    let id_str: String = row.try_get("id")?;
    let id = id_str
        .parse::<ProductId>()
        .map_err(|e| RepositoryError::DataCorruption(format!("product id {id_str:?}: {e}")))?;
    let price_str: String = row.try_get("price")?;
    let price = price_str
        .parse::<Decimal>()
        .map_err(|e| RepositoryError::DataCorruption(format!("price {price_str:?}: {e}")))?;

    Ok(Some(ResolvedProduct {
        id,
        name: row.try_get("name")?,
        price,
        stock: row.try_get("stock")?,
    }))
}

/// Generate a time-derived, human-readable order number.
///
/// The random suffix keeps numbers unique when orders land in the same
/// millisecond; the column's UNIQUE constraint backstops the remaining odds.
fn generate_order_number() -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix: String = rand::rng()
        .sample_iter(rand::distr::Alphanumeric)
        .take(4)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();
    format!("ORD-{millis}-{suffix}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::db::{ProductRepository, create_pool_with, run_migrations};
    use crate::models::NewProduct;

    use super::*;

    async fn setup() -> (FulfillmentEngine, ProductRepository) {
        let pool = create_pool_with("sqlite::memory:", 1, 30).await.expect("connect");
        run_migrations(&pool).await.expect("migrate");
        (
            FulfillmentEngine::new(pool.clone()),
            ProductRepository::new(pool),
        )
    }

    async fn seed(products: &ProductRepository, name: &str, price: &str, stock: i64) -> ProductId {
        products
            .create(&NewProduct {
                name: name.to_string(),
                description: format!("{name} description"),
                price: price.parse().unwrap(),
                stock,
                category: "Test".to_string(),
                image_url: None,
            })
            .await
            .expect("seed product")
            .id
    }

    fn by_name(name: &str, quantity: u32) -> OrderLineRequest {
        OrderLineRequest {
            product: ProductRef::Name(name.to_string()),
            quantity,
        }
    }

    #[test]
    fn test_order_number_shape() {
        let number = generate_order_number();
        assert!(number.starts_with("ORD-"));
        let suffix = number.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 4);
        assert!(suffix.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn test_place_order_decrements_stock_and_totals() {
        let (engine, products) = setup().await;
        let laptop = seed(&products, "MacBook Pro M2", "1299.00", 5).await;
        seed(&products, "Logitech MX Master 3", "99.00", 12).await;

        let order = engine
            .place_order(
                "shopper@example.com",
                &[
                    OrderLineRequest {
                        product: ProductRef::Id(laptop),
                        quantity: 2,
                    },
                    by_name("logitech mx master 3", 3),
                ],
            )
            .await
            .expect("place order");

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_amount, Decimal::new(289500, 2)); // 2*1299 + 3*99
        assert_eq!(order.items.len(), 2);
        let first = order.items.first().unwrap();
        assert_eq!(first.unit_price, Decimal::new(129900, 2));
        assert_eq!(first.quantity, 2);

        let remaining = products.get(laptop).await.unwrap().unwrap();
        assert_eq!(remaining.stock, 3);
    }

    #[tokio::test]
    async fn test_unknown_product_fails_whole_order() {
        let (engine, products) = setup().await;
        let laptop = seed(&products, "MacBook Pro M2", "1299.00", 5).await;

        let err = engine
            .place_order(
                "shopper@example.com",
                &[by_name("MacBook Pro M2", 1), by_name("Flux Capacitor", 1)],
            )
            .await
            .expect_err("should fail");

        assert!(matches!(err, OrderError::ProductNotFound(ref name) if name == "Flux Capacitor"));

        // No partial effects: the valid line's stock is untouched.
        let untouched = products.get(laptop).await.unwrap().unwrap();
        assert_eq!(untouched.stock, 5);
    }

    #[tokio::test]
    async fn test_insufficient_stock_names_product() {
        let (engine, products) = setup().await;
        seed(&products, "iPad Air 5", "649.00", 2).await;

        let err = engine
            .place_order("shopper@example.com", &[by_name("iPad Air 5", 3)])
            .await
            .expect_err("should fail");

        assert!(matches!(err, OrderError::InsufficientStock(ref name) if name == "iPad Air 5"));
        assert_eq!(err.to_string(), "Insufficient stock for iPad Air 5");
    }

    #[tokio::test]
    async fn test_first_failing_line_wins() {
        let (engine, products) = setup().await;
        seed(&products, "iPad Air 5", "649.00", 1).await;

        // Line 1 has too little stock, line 2 does not exist; the order
        // reports the stock failure because it comes first.
        let err = engine
            .place_order(
                "shopper@example.com",
                &[by_name("iPad Air 5", 5), by_name("Flux Capacitor", 1)],
            )
            .await
            .expect_err("should fail");

        assert!(matches!(err, OrderError::InsufficientStock(_)));
    }

    #[tokio::test]
    async fn test_duplicate_lines_cannot_overdraw() {
        let (engine, products) = setup().await;
        let id = seed(&products, "Keychron K2", "85.00", 5).await;

        // Each line passes validation against the same snapshot (5 >= 3),
        // but together they need 6; the second conditional decrement loses
        // and the whole order rolls back.
        let err = engine
            .place_order(
                "shopper@example.com",
                &[by_name("Keychron K2", 3), by_name("Keychron K2", 3)],
            )
            .await
            .expect_err("should fail");

        assert!(matches!(err, OrderError::InsufficientStock(_)));
        let untouched = products.get(id).await.unwrap().unwrap();
        assert_eq!(untouched.stock, 5);
    }

    #[tokio::test]
    async fn test_rejects_bad_email_and_empty_items() {
        let (engine, products) = setup().await;
        seed(&products, "Keychron K2", "85.00", 5).await;

        let err = engine
            .place_order("not-an-email", &[by_name("Keychron K2", 1)])
            .await
            .expect_err("should fail");
        assert!(matches!(err, OrderError::Validation(_)));

        let err = engine
            .place_order("shopper@example.com", &[])
            .await
            .expect_err("should fail");
        assert!(matches!(err, OrderError::Validation(_)));

        let err = engine
            .place_order("shopper@example.com", &[by_name("Keychron K2", 0)])
            .await
            .expect_err("should fail");
        assert!(matches!(err, OrderError::Validation(_)));
    }

    #[tokio::test]
    async fn test_captures_price_at_order_time() {
        let (engine, products) = setup().await;
        let id = seed(&products, "Bose QC45", "329.00", 10).await;

        let order = engine
            .place_order("shopper@example.com", &[by_name("Bose QC45", 1)])
            .await
            .expect("place order");

        // A later price change must not affect the recorded line.
        products
            .update(
                id,
                &crate::models::ProductPatch {
                    price: Some(Decimal::new(39900, 2)),
                    ..crate::models::ProductPatch::default()
                },
            )
            .await
            .expect("update price");

        assert_eq!(
            order.items.first().unwrap().unit_price,
            Decimal::new(32900, 2)
        );
        assert_eq!(order.total_amount, Decimal::new(32900, 2));
    }
}
