//! Product catalog repository.

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use shoptalk_core::ProductId;

use crate::models::{NewProduct, Product, ProductPatch};

use super::{RepositoryError, parse_decimal, parse_timestamp};

/// Maximum rows returned by a catalog search.
pub const SEARCH_LIMIT: i64 = 20;

/// Repository for catalog products.
#[derive(Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new product and return it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` on storage failure.
    pub async fn create(&self, new: &NewProduct) -> Result<Product, RepositoryError> {
        let product = Product {
            id: ProductId::generate(),
            name: new.name.clone(),
            description: new.description.clone(),
            price: new.price,
            stock: new.stock,
            category: new.category.clone(),
            image_url: new.image_url.clone(),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO product (id, name, description, price, stock, category, image_url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(product.id.to_string())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.to_string())
        .bind(product.stock)
        .bind(&product.category)
        .bind(product.image_url.as_deref())
        .bind(product.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    /// Fetch a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` on storage failure.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, description, price, stock, category, image_url, created_at
             FROM product WHERE id = ?1",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    /// Fetch a product by exact name, case-insensitively.
    ///
    /// This is the lookup the conversational tools use: the model refers to
    /// products by name, never by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` on storage failure.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, description, price, stock, category, image_url, created_at
             FROM product WHERE name = ?1 COLLATE NOCASE LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    /// Case-insensitive substring search over name and category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` on storage failure.
    pub async fn search(&self, term: &str) -> Result<Vec<Product>, RepositoryError> {
        let pattern = format!("%{}%", escape_like(term));

        let rows = sqlx::query(
            "SELECT id, name, description, price, stock, category, image_url, created_at
             FROM product
             WHERE name LIKE ?1 ESCAPE '\\' OR category LIKE ?1 ESCAPE '\\'
             ORDER BY name
             LIMIT ?2",
        )
        .bind(&pattern)
        .bind(SEARCH_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_product).collect()
    }

    /// All products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` on storage failure.
    pub async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, description, price, stock, category, image_url, created_at
             FROM product ORDER BY created_at DESC, id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_product).collect()
    }

    /// Apply a partial update and return the updated product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn update(
        &self,
        id: ProductId,
        patch: &ProductPatch,
    ) -> Result<Product, RepositoryError> {
        let current = self.get(id).await?.ok_or(RepositoryError::NotFound)?;

        let updated = Product {
            id: current.id,
            name: patch.name.clone().unwrap_or(current.name),
            description: patch.description.clone().unwrap_or(current.description),
            price: patch.price.unwrap_or(current.price),
            stock: patch.stock.unwrap_or(current.stock),
            category: patch.category.clone().unwrap_or(current.category),
            image_url: patch.image_url.clone().or(current.image_url),
            created_at: current.created_at,
        };

        let result = sqlx::query(
            "UPDATE product
             SET name = ?2, description = ?3, price = ?4, stock = ?5, category = ?6, image_url = ?7
             WHERE id = ?1",
        )
        .bind(updated.id.to_string())
        .bind(&updated.name)
        .bind(&updated.description)
        .bind(updated.price.to_string())
        .bind(updated.stock)
        .bind(&updated.category)
        .bind(updated.image_url.as_deref())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(updated)
    }

    /// Delete a product and return the deleted row.
    ///
    /// Order lines referencing the product survive: they hold only a weak
    /// reference.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn delete(&self, id: ProductId) -> Result<Product, RepositoryError> {
        let product = self.get(id).await?.ok_or(RepositoryError::NotFound)?;

        let result = sqlx::query("DELETE FROM product WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(product)
    }

    /// Number of products in the catalog.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` on storage failure.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM product")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.try_get("count")?)
    }
}

/// Map a product row into the domain model.
fn row_to_product(row: &SqliteRow) -> Result<Product, RepositoryError> {
    let id_str: String = row.try_get("id")?;
    let id = id_str
        .parse::<ProductId>()
        .map_err(|e| RepositoryError::DataCorruption(format!("product id {id_str:?}: {e}")))?;

    let price_str: String = row.try_get("price")?;
    let created_at_str: String = row.try_get("created_at")?;

    Ok(Product {
        id,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: parse_decimal(&price_str)?,
        stock: row.try_get("stock")?,
        category: row.try_get("category")?,
        image_url: row.try_get("image_url")?,
        created_at: parse_timestamp(&created_at_str)?,
    })
}

/// Escape LIKE wildcards so search terms match literally.
fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
