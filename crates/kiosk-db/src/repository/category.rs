//! # Category Repository
//!
//! Categories group products and carry an optional default pack size that
//! feeds the pack-size table during stock intake.

use chrono::Utc;
use kiosk_core::Category;
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use tracing::info;

use super::new_id;
use crate::error::{DbError, DbResult};

const CATEGORY_COLUMNS: &str = "id, name, default_pack_size, created_at";

async fn fetch_category<'e, E>(executor: E, id: &str) -> DbResult<Option<Category>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1");
    let category = sqlx::query_as::<_, Category>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(category)
}

/// Repository for category database operations.
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    /// Creates a new CategoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository { pool }
    }

    /// All categories by name.
    pub async fn list(&self) -> DbResult<Vec<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY name");
        let categories = sqlx::query_as::<_, Category>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(categories)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Category>> {
        fetch_category(&self.pool, id).await
    }

    /// Creates a category. A taken name is a `UniqueViolation`.
    pub async fn insert(&self, name: &str, default_pack_size: Option<i64>) -> DbResult<Category> {
        let category = Category {
            id: new_id(),
            name: name.to_string(),
            default_pack_size,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO categories (id, name, default_pack_size, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&category.id)
        .bind(&category.name)
        .bind(category.default_pack_size)
        .bind(category.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from(e).with_duplicate_value(name))?;

        info!(category_id = %category.id, name = %category.name, "Category created");
        Ok(category)
    }

    /// Replaces name and default pack size.
    pub async fn update(
        &self,
        id: &str,
        name: &str,
        default_pack_size: Option<i64>,
    ) -> DbResult<Category> {
        let result = sqlx::query("UPDATE categories SET name = ?2, default_pack_size = ?3 WHERE id = ?1")
            .bind(id)
            .bind(name)
            .bind(default_pack_size)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::from(e).with_duplicate_value(name))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id));
        }

        info!(category_id = %id, name = %name, "Category updated");
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Category", id))
    }

    /// Deletes a category. Fails with `ForeignKeyViolation` while products
    /// still reference it.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id));
        }

        info!(category_id = %id, "Category deleted");
        Ok(())
    }
}

/// Category reads inside a [`UnitOfWork`](crate::UnitOfWork).
pub struct CategoryOps<'a> {
    conn: &'a mut SqliteConnection,
}

impl<'a> CategoryOps<'a> {
    pub(crate) fn new(conn: &'a mut SqliteConnection) -> Self {
        CategoryOps { conn }
    }

    pub async fn get(&mut self, id: &str) -> DbResult<Option<Category>> {
        fetch_category(&mut *self.conn, id).await
    }

    /// Finds a category by exact name.
    pub async fn find_by_name(&mut self, name: &str) -> DbResult<Option<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE name = ?1");
        let category = sqlx::query_as::<_, Category>(&sql)
            .bind(name)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(category)
    }

    /// Creates a category inside the transaction (used by the seed).
    pub async fn insert(&mut self, category: &Category) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO categories (id, name, default_pack_size, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&category.id)
        .bind(&category.name)
        .bind(category.default_pack_size)
        .bind(category.created_at)
        .execute(&mut *self.conn)
        .await
        .map_err(|e| DbError::from(e).with_duplicate_value(category.name.clone()))?;
        Ok(())
    }
}
