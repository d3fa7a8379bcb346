//! Order repository: lookups, filtered lists, status updates, aggregates.
//!
//! Order creation is not here. It belongs to the fulfillment engine, which
//! owns the stock-decrement transaction that order inserts must share.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use shoptalk_core::{Email, OrderId, OrderLineId, OrderStatus, ProductId};

use crate::models::{Order, OrderLine, StatusCount};

use super::{RepositoryError, parse_decimal, parse_timestamp};

/// Maximum orders rendered for one customer in a tool response.
pub const CUSTOMER_ORDERS_LIMIT: i64 = 10;

const ORDER_COLUMNS: &str = "id, order_number, customer_email, total_amount, status, created_at";

/// Aggregates over all orders, for the dashboard.
#[derive(Debug, Clone)]
pub struct OrderAggregates {
    pub total_orders: i64,
    pub total_revenue: Decimal,
    pub by_status: Vec<StatusCount>,
    pub last_order_date: Option<DateTime<Utc>>,
}

/// Repository for customer orders.
#[derive(Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetch an order with its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` on storage failure.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM customer_order WHERE id = ?1"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let order = self.attach_lines(row_to_order(&row)?).await?;
        Ok(Some(order))
    }

    /// All orders, newest first, optionally filtered by status and/or
    /// customer email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` on storage failure.
    pub async fn list(
        &self,
        status: Option<OrderStatus>,
        email: Option<&str>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = match (status, email) {
            (Some(status), Some(email)) => {
                sqlx::query(&format!(
                    "SELECT {ORDER_COLUMNS} FROM customer_order
                     WHERE status = ?1 AND customer_email = ?2
                     ORDER BY created_at DESC, id"
                ))
                .bind(status.as_str())
                .bind(email)
                .fetch_all(&self.pool)
                .await?
            }
            (Some(status), None) => {
                sqlx::query(&format!(
                    "SELECT {ORDER_COLUMNS} FROM customer_order
                     WHERE status = ?1
                     ORDER BY created_at DESC, id"
                ))
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            (None, Some(email)) => {
                sqlx::query(&format!(
                    "SELECT {ORDER_COLUMNS} FROM customer_order
                     WHERE customer_email = ?1
                     ORDER BY created_at DESC, id"
                ))
                .bind(email)
                .fetch_all(&self.pool)
                .await?
            }
            (None, None) => {
                sqlx::query(&format!(
                    "SELECT {ORDER_COLUMNS} FROM customer_order ORDER BY created_at DESC, id"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            orders.push(self.attach_lines(row_to_order(row)?).await?);
        }
        Ok(orders)
    }

    /// Orders for one customer, newest first, optionally capped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` on storage failure.
    pub async fn find_by_email(
        &self,
        email: &str,
        limit: Option<i64>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM customer_order
             WHERE customer_email = ?1
             ORDER BY created_at DESC, id
             LIMIT ?2"
        ))
        .bind(email)
        .bind(limit.unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            orders.push(self.attach_lines(row_to_order(row)?).await?);
        }
        Ok(orders)
    }

    /// Set an order's status. Any status may be assigned from any status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let result = sqlx::query("UPDATE customer_order SET status = ?2 WHERE id = ?1")
            .bind(id.to_string())
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Order aggregates for the dashboard.
    ///
    /// Revenue is summed in decimal arithmetic here rather than in SQL:
    /// totals are stored as decimal TEXT and SQLite would sum them as floats.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` on storage failure.
    pub async fn aggregates(&self) -> Result<OrderAggregates, RepositoryError> {
        let totals = sqlx::query("SELECT total_amount FROM customer_order")
            .fetch_all(&self.pool)
            .await?;

        let total_orders = i64::try_from(totals.len())
            .map_err(|e| RepositoryError::DataCorruption(format!("order count: {e}")))?;
        let mut total_revenue = Decimal::ZERO;
        for row in &totals {
            let amount: String = row.try_get("total_amount")?;
            total_revenue += parse_decimal(&amount)?;
        }

        let grouped =
            sqlx::query("SELECT status, COUNT(*) AS count FROM customer_order GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        let mut counts = Vec::with_capacity(grouped.len());
        for row in &grouped {
            let status_str: String = row.try_get("status")?;
            let status = status_str.parse::<OrderStatus>().map_err(|e| {
                RepositoryError::DataCorruption(format!("order status {status_str:?}: {e}"))
            })?;
            counts.push(StatusCount {
                status,
                count: row.try_get("count")?,
            });
        }
        // Lifecycle order, not GROUP BY's alphabetical order.
        let by_status = OrderStatus::ALL
            .into_iter()
            .filter_map(|status| {
                counts
                    .iter()
                    .find(|c| c.status == status)
                    .map(|c| StatusCount {
                        status,
                        count: c.count,
                    })
            })
            .collect();

        let last_row = sqlx::query("SELECT MAX(created_at) AS last FROM customer_order")
            .fetch_one(&self.pool)
            .await?;
        let last: Option<String> = last_row.try_get("last")?;
        let last_order_date = last.as_deref().map(parse_timestamp).transpose()?;

        Ok(OrderAggregates {
            total_orders,
            total_revenue,
            by_status,
            last_order_date,
        })
    }

    async fn attach_lines(&self, mut order: Order) -> Result<Order, RepositoryError> {
        let rows = sqlx::query(
            "SELECT ol.id, ol.order_id, ol.product_id, ol.quantity, ol.unit_price,
                    p.name AS product_name
             FROM order_line ol
             LEFT JOIN product p ON p.id = ol.product_id
             WHERE ol.order_id = ?1
             ORDER BY ol.rowid",
        )
        .bind(order.id.to_string())
        .fetch_all(&self.pool)
        .await?;

        order.items = rows.iter().map(row_to_order_line).collect::<Result<_, _>>()?;
        Ok(order)
    }
}

/// Map an order row (without lines) into the domain model.
fn row_to_order(row: &SqliteRow) -> Result<Order, RepositoryError> {
    let id_str: String = row.try_get("id")?;
    let id = id_str
        .parse::<OrderId>()
        .map_err(|e| RepositoryError::DataCorruption(format!("order id {id_str:?}: {e}")))?;

    let email_str: String = row.try_get("customer_email")?;
    let customer_email = Email::parse(&email_str)
        .map_err(|e| RepositoryError::DataCorruption(format!("customer email: {e}")))?;

    let total_str: String = row.try_get("total_amount")?;
    let status_str: String = row.try_get("status")?;
    let status = status_str.parse::<OrderStatus>().map_err(|e| {
        RepositoryError::DataCorruption(format!("order status {status_str:?}: {e}"))
    })?;
    let created_at_str: String = row.try_get("created_at")?;

    Ok(Order {
        id,
        order_number: row.try_get("order_number")?,
        customer_email,
        total_amount: parse_decimal(&total_str)?,
        status,
        created_at: parse_timestamp(&created_at_str)?,
        items: Vec::new(),
    })
}

/// Map an order line row into the domain model.
fn row_to_order_line(row: &SqliteRow) -> Result<OrderLine, RepositoryError> {
    let id_str: String = row.try_get("id")?;
    let id = id_str
        .parse::<OrderLineId>()
        .map_err(|e| RepositoryError::DataCorruption(format!("line id {id_str:?}: {e}")))?;

    let order_id_str: String = row.try_get("order_id")?;
    let order_id = order_id_str
        .parse::<OrderId>()
        .map_err(|e| RepositoryError::DataCorruption(format!("line order id: {e}")))?;

    let product_id_str: String = row.try_get("product_id")?;
    let product_id = product_id_str
        .parse::<ProductId>()
        .map_err(|e| RepositoryError::DataCorruption(format!("line product id: {e}")))?;

    let quantity_raw: i64 = row.try_get("quantity")?;
    let quantity = u32::try_from(quantity_raw)
        .map_err(|_| RepositoryError::DataCorruption(format!("line quantity {quantity_raw}")))?;

    let unit_price_str: String = row.try_get("unit_price")?;

    Ok(OrderLine {
        id,
        order_id,
        product_id,
        quantity,
        unit_price: parse_decimal(&unit_price_str)?,
        product_name: row.try_get("product_name")?,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::db::{create_pool_with, run_migrations};

    use super::*;

    async fn repo() -> OrderRepository {
        let pool = create_pool_with("sqlite::memory:", 1, 30).await.expect("connect");
        run_migrations(&pool).await.expect("migrate");
        OrderRepository::new(pool)
    }

    async fn seed_order(
        repo: &OrderRepository,
        number: &str,
        email: &str,
        status: OrderStatus,
        total: &str,
        created_at: &str,
    ) -> OrderId {
        let id = OrderId::generate();
        sqlx::query(
            "INSERT INTO customer_order (id, order_number, customer_email, total_amount, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(id.to_string())
        .bind(number)
        .bind(email)
        .bind(total)
        .bind(status.as_str())
        .bind(created_at)
        .execute(&repo.pool)
        .await
        .expect("insert order");

        sqlx::query(
            "INSERT INTO order_line (id, order_id, product_id, quantity, unit_price)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(OrderLineId::generate().to_string())
        .bind(id.to_string())
        .bind(ProductId::generate().to_string())
        .bind(2_i64)
        .bind("49.50")
        .execute(&repo.pool)
        .await
        .expect("insert line");

        id
    }

    #[tokio::test]
    async fn test_get_attaches_lines() {
        let repo = repo().await;
        let id = seed_order(
            &repo,
            "ORD-1-AAAA",
            "a@example.com",
            OrderStatus::Pending,
            "99.00",
            "2026-01-01T10:00:00+00:00",
        )
        .await;

        let order = repo.get(id).await.expect("get").expect("present");
        assert_eq!(order.order_number, "ORD-1-AAAA");
        assert_eq!(order.items.len(), 1);
        let line = order.items.first().unwrap();
        assert_eq!(line.quantity, 2);
        assert_eq!(line.unit_price, Decimal::new(4950, 2));
        // Product was never inserted, so the name join comes back empty.
        assert_eq!(line.display_name(), "(deleted product)");
    }

    #[tokio::test]
    async fn test_list_filters_by_status_and_email() {
        let repo = repo().await;
        seed_order(
            &repo,
            "ORD-1-AAAA",
            "a@example.com",
            OrderStatus::Pending,
            "10.00",
            "2026-01-01T10:00:00+00:00",
        )
        .await;
        seed_order(
            &repo,
            "ORD-2-BBBB",
            "b@example.com",
            OrderStatus::Shipped,
            "20.00",
            "2026-01-02T10:00:00+00:00",
        )
        .await;
        seed_order(
            &repo,
            "ORD-3-CCCC",
            "a@example.com",
            OrderStatus::Shipped,
            "30.00",
            "2026-01-03T10:00:00+00:00",
        )
        .await;

        let all = repo.list(None, None).await.expect("list");
        assert_eq!(all.len(), 3);
        assert_eq!(all.first().unwrap().order_number, "ORD-3-CCCC");

        let shipped = repo.list(Some(OrderStatus::Shipped), None).await.expect("list");
        assert_eq!(shipped.len(), 2);

        let for_a = repo.list(None, Some("a@example.com")).await.expect("list");
        assert_eq!(for_a.len(), 2);

        let shipped_a = repo
            .list(Some(OrderStatus::Shipped), Some("a@example.com"))
            .await
            .expect("list");
        assert_eq!(shipped_a.len(), 1);
        assert_eq!(shipped_a.first().unwrap().order_number, "ORD-3-CCCC");
    }

    #[tokio::test]
    async fn test_find_by_email_caps_results() {
        let repo = repo().await;
        for i in 0..4 {
            seed_order(
                &repo,
                &format!("ORD-{i}-XXXX"),
                "a@example.com",
                OrderStatus::Pending,
                "10.00",
                &format!("2026-01-0{}T10:00:00+00:00", i + 1),
            )
            .await;
        }

        let capped = repo
            .find_by_email("a@example.com", Some(2))
            .await
            .expect("find");
        assert_eq!(capped.len(), 2);
        assert_eq!(capped.first().unwrap().order_number, "ORD-3-XXXX");

        let uncapped = repo.find_by_email("a@example.com", None).await.expect("find");
        assert_eq!(uncapped.len(), 4);
    }

    #[tokio::test]
    async fn test_update_status_any_to_any() {
        let repo = repo().await;
        let id = seed_order(
            &repo,
            "ORD-1-AAAA",
            "a@example.com",
            OrderStatus::Delivered,
            "10.00",
            "2026-01-01T10:00:00+00:00",
        )
        .await;

        // Backwards transition is allowed by design.
        let order = repo
            .update_status(id, OrderStatus::Pending)
            .await
            .expect("update");
        assert_eq!(order.status, OrderStatus::Pending);

        let err = repo
            .update_status(OrderId::generate(), OrderStatus::Shipped)
            .await
            .expect_err("missing order");
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_aggregates() {
        let repo = repo().await;

        let empty = repo.aggregates().await.expect("aggregates");
        assert_eq!(empty.total_orders, 0);
        assert_eq!(empty.total_revenue, Decimal::ZERO);
        assert!(empty.by_status.is_empty());
        assert!(empty.last_order_date.is_none());

        seed_order(
            &repo,
            "ORD-1-AAAA",
            "a@example.com",
            OrderStatus::Pending,
            "10.50",
            "2026-01-01T10:00:00+00:00",
        )
        .await;
        seed_order(
            &repo,
            "ORD-2-BBBB",
            "b@example.com",
            OrderStatus::Pending,
            "20.25",
            "2026-01-02T10:00:00+00:00",
        )
        .await;
        seed_order(
            &repo,
            "ORD-3-CCCC",
            "a@example.com",
            OrderStatus::Cancelled,
            "5.00",
            "2026-01-03T10:00:00+00:00",
        )
        .await;

        let stats = repo.aggregates().await.expect("aggregates");
        assert_eq!(stats.total_orders, 3);
        assert_eq!(stats.total_revenue, Decimal::new(3575, 2));
        assert_eq!(stats.by_status.len(), 2);
        // Lifecycle order: PENDING before CANCELLED.
        assert_eq!(stats.by_status.first().unwrap().status, OrderStatus::Pending);
        assert_eq!(stats.by_status.first().unwrap().count, 2);
        assert_eq!(
            stats.last_order_date.unwrap().to_rfc3339(),
            "2026-01-03T10:00:00+00:00"
        );
    }
}
