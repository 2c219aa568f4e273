//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - Paginated search on name and SKU
//! - CRUD operations
//! - Guarded stock updates (inside a unit of work)
//!
//! ## Guarded Decrement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UPDATE products SET stock = stock - :qty                               │
//! │  WHERE id = :id AND stock >= :qty                                       │
//! │                                                                         │
//! │  rows_affected = 1  → stock taken                                       │
//! │  rows_affected = 0  → not enough stock (or no such product);            │
//! │                       the service turns this into InsufficientStock     │
//! │                       and the whole unit of work rolls back             │
//! │                                                                         │
//! │  The check and the write are one statement, so no interleaving         │
//! │  request can slip between "enough stock?" and "take it".                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use kiosk_core::{Money, Page, PageRequest, Product};
use sqlx::{Executor, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};

pub(crate) const PRODUCT_COLUMNS: &str = "id, name, sku, category_id, price, cost_price, stock, \
     is_active, pack_size, is_composite, bun_component_id, sausage_component_id, \
     sausages_per_unit, created_at, updated_at";

/// Filters for the product list.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Case-insensitive substring of name or SKU.
    pub search: Option<String>,
    pub category_id: Option<String>,
    pub active: Option<bool>,
}

/// `%term%` with LIKE wildcards escaped (`ESCAPE '\'`).
pub(crate) fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

async fn fetch_product<'e, E>(executor: E, id: &str) -> DbResult<Option<Product>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
    let product = sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(product)
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
///
/// let filter = ProductFilter { search: Some("cola".into()), ..Default::default() };
/// let page = repo.list(&filter, PageRequest::new(Some(1), Some(20), 20, 100)).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Lists products, newest first.
    ///
    /// ## Arguments
    /// * `filter` - search term, category and active flag (all optional)
    /// * `page` - normalized page request
    pub async fn list(&self, filter: &ProductFilter, page: PageRequest) -> DbResult<Page<Product>> {
        let pattern = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern);

        debug!(search = ?pattern, category = ?filter.category_id, "Listing products");

        const WHERE: &str = r#"
            WHERE (?1 IS NULL OR name LIKE ?1 ESCAPE '\' OR sku LIKE ?1 ESCAPE '\')
              AND (?2 IS NULL OR category_id = ?2)
              AND (?3 IS NULL OR is_active = ?3)
        "#;

        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products {WHERE} \
             ORDER BY created_at DESC, id LIMIT ?4 OFFSET ?5"
        );
        let items = sqlx::query_as::<_, Product>(&sql)
            .bind(&pattern)
            .bind(&filter.category_id)
            .bind(filter.active)
            .bind(page.limit as i64)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM products {WHERE}"))
            .bind(&pattern)
            .bind(&filter.category_id)
            .bind(filter.active)
            .fetch_one(&self.pool)
            .await?;

        debug!(count = items.len(), total, "Product page loaded");
        Ok(page.wrap(items, total))
    }

    /// Gets a product by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Product>> {
        fetch_product(&self.pool, id).await
    }

    /// Every product by name, for the stock export.
    pub async fn all(&self) -> DbResult<Vec<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name, sku");
        let products = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    /// Deletes a product.
    ///
    /// ## Errors
    /// - `NotFound` if the product doesn't exist
    /// - `ForeignKeyViolation` if sales, movements or a composite reference it
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        info!(product_id = %id, "Product deleted");
        Ok(())
    }
}

/// Product statements inside a [`UnitOfWork`](crate::UnitOfWork).
pub struct ProductOps<'a> {
    conn: &'a mut SqliteConnection,
}

impl<'a> ProductOps<'a> {
    pub(crate) fn new(conn: &'a mut SqliteConnection) -> Self {
        ProductOps { conn }
    }

    pub async fn get(&mut self, id: &str) -> DbResult<Option<Product>> {
        fetch_product(&mut *self.conn, id).await
    }

    /// Loads several products keyed by id. Missing ids are simply absent.
    pub async fn get_many(&mut self, ids: &[String]) -> DbResult<HashMap<String, Product>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id IN ("
        ));
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(id.clone());
        }
        separated.push_unseparated(")");

        let products = query
            .build_query_as::<Product>()
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(products.into_iter().map(|p| (p.id.clone(), p)).collect())
    }

    /// Whether a SKU is already used.
    pub async fn sku_taken(&mut self, sku: &str) -> DbResult<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM products WHERE sku = ?1")
            .bind(sku)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(found.is_some())
    }

    /// Inserts a complete product row.
    pub async fn insert(&mut self, product: &Product) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, sku, category_id, price, cost_price, stock,
                is_active, pack_size, is_composite, bun_component_id,
                sausage_component_id, sausages_per_unit, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.sku)
        .bind(&product.category_id)
        .bind(product.price)
        .bind(product.cost_price)
        .bind(product.stock)
        .bind(product.is_active)
        .bind(product.pack_size)
        .bind(product.is_composite)
        .bind(&product.bun_component_id)
        .bind(&product.sausage_component_id)
        .bind(product.sausages_per_unit)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *self.conn)
        .await
        .map_err(|e| DbError::from(e).with_duplicate_value(product.sku.clone()))?;

        info!(product_id = %product.id, sku = %product.sku, "Product created");
        Ok(())
    }

    /// Writes every catalog column of a product. Stock is left alone:
    /// it only changes through receipts, issues and sales.
    pub async fn update(&mut self, product: &Product) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?2,
                sku = ?3,
                category_id = ?4,
                price = ?5,
                cost_price = ?6,
                is_active = ?7,
                pack_size = ?8,
                is_composite = ?9,
                bun_component_id = ?10,
                sausage_component_id = ?11,
                sausages_per_unit = ?12,
                updated_at = ?13
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.sku)
        .bind(&product.category_id)
        .bind(product.price)
        .bind(product.cost_price)
        .bind(product.is_active)
        .bind(product.pack_size)
        .bind(product.is_composite)
        .bind(&product.bun_component_id)
        .bind(&product.sausage_component_id)
        .bind(product.sausages_per_unit)
        .bind(product.updated_at)
        .execute(&mut *self.conn)
        .await
        .map_err(|e| DbError::from(e).with_duplicate_value(product.sku.clone()))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }

        info!(product_id = %product.id, "Product updated");
        Ok(())
    }

    /// Adds received units and refreshes the prices that came with them.
    ///
    /// `unit_cost` / `sale_price` of `None` keep the current value;
    /// `pack_size` of `Some` is stored as the product's pack size.
    pub async fn receive(
        &mut self,
        id: &str,
        units: i64,
        unit_cost: Option<Money>,
        sale_price: Option<Money>,
        pack_size: Option<i64>,
        at: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE products SET
                stock = stock + ?2,
                cost_price = COALESCE(?3, cost_price),
                price = COALESCE(?4, price),
                pack_size = COALESCE(?5, pack_size),
                updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(units)
        .bind(unit_cost)
        .bind(sale_price)
        .bind(pack_size)
        .bind(at)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }

    /// Takes `quantity` units if at least that many are on hand.
    ///
    /// Returns `false` when the guard rejected the update.
    pub async fn decrement(&mut self, id: &str, quantity: i64, at: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE products SET stock = stock - ?2, updated_at = ?3
            WHERE id = ?1 AND stock >= ?2
            "#,
        )
        .bind(id)
        .bind(quantity)
        .bind(at)
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("cola"), "%cola%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
