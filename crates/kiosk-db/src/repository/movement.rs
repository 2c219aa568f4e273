//! # Movement Repository
//!
//! The append-only inventory ledger. Rows are only ever inserted, each
//! one inside the unit of work that changed the stock it describes.

use chrono::{DateTime, Utc};
use kiosk_core::period::DateRange;
use kiosk_core::{Money, MovementType, Page, PageRequest, StockMovement};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::new_id;
use crate::error::DbResult;

/// A ledger row joined with product and user names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MovementView {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    #[serde(rename = "type")]
    pub kind: MovementType,
    pub quantity: i64,
    pub unit_price: Option<Money>,
    pub unit_cost: Option<Money>,
    pub note: Option<String>,
    pub user_id: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// Filters for the movement list.
#[derive(Debug, Clone, Default)]
pub struct MovementFilter {
    pub range: DateRange,
    pub kind: Option<MovementType>,
    pub product_id: Option<String>,
}

/// Input for a new ledger row.
#[derive(Debug, Clone)]
pub struct NewMovement<'a> {
    pub product_id: &'a str,
    pub kind: MovementType,
    pub quantity: i64,
    pub unit_price: Option<Money>,
    pub unit_cost: Option<Money>,
    pub note: Option<&'a str>,
    pub user_id: &'a str,
}

/// Repository for reading the inventory ledger.
#[derive(Debug, Clone)]
pub struct MovementRepository {
    pool: SqlitePool,
}

impl MovementRepository {
    /// Creates a new MovementRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MovementRepository { pool }
    }

    /// Lists movements newest first, paginated.
    pub async fn list(&self, filter: &MovementFilter, page: PageRequest) -> DbResult<Page<MovementView>> {
        debug!(?filter, page = page.page, "Listing stock movements");

        const FROM_WHERE: &str = r#"
            FROM stock_movements m
            JOIN products p ON p.id = m.product_id
            JOIN users u ON u.id = m.user_id
            WHERE (?1 IS NULL OR m.created_at >= ?1)
              AND (?2 IS NULL OR m.created_at <= ?2)
              AND (?3 IS NULL OR m.type = ?3)
              AND (?4 IS NULL OR m.product_id = ?4)
        "#;

        let sql = format!(
            "SELECT m.id, m.product_id, p.name AS product_name, m.type AS kind, m.quantity, \
             m.unit_price, m.unit_cost, m.note, m.user_id, u.username, m.created_at \
             {FROM_WHERE} ORDER BY m.created_at DESC, m.id LIMIT ?5 OFFSET ?6"
        );
        let items = sqlx::query_as::<_, MovementView>(&sql)
            .bind(filter.range.from)
            .bind(filter.range.to)
            .bind(filter.kind)
            .bind(&filter.product_id)
            .bind(page.limit as i64)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) {FROM_WHERE}"))
            .bind(filter.range.from)
            .bind(filter.range.to)
            .bind(filter.kind)
            .bind(&filter.product_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(page.wrap(items, total))
    }

    /// Every movement of one product, oldest first.
    pub async fn for_product(&self, product_id: &str) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, product_id, type AS kind, quantity, unit_price, unit_cost,
                   note, user_id, created_at
            FROM stock_movements
            WHERE product_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(movements)
    }
}

/// Ledger writes inside a [`UnitOfWork`](crate::UnitOfWork).
pub struct MovementOps<'a> {
    conn: &'a mut SqliteConnection,
}

impl<'a> MovementOps<'a> {
    pub(crate) fn new(conn: &'a mut SqliteConnection) -> Self {
        MovementOps { conn }
    }

    /// Appends a ledger row.
    pub async fn record(&mut self, new: NewMovement<'_>, at: DateTime<Utc>) -> DbResult<StockMovement> {
        let movement = StockMovement {
            id: new_id(),
            product_id: new.product_id.to_string(),
            kind: new.kind,
            quantity: new.quantity,
            unit_price: new.unit_price,
            unit_cost: new.unit_cost,
            note: new.note.map(str::to_string),
            user_id: new.user_id.to_string(),
            created_at: at,
        };

        sqlx::query(
            r#"
            INSERT INTO stock_movements
                (id, product_id, type, quantity, unit_price, unit_cost, note, user_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.product_id)
        .bind(movement.kind)
        .bind(movement.quantity)
        .bind(movement.unit_price)
        .bind(movement.unit_cost)
        .bind(&movement.note)
        .bind(&movement.user_id)
        .bind(movement.created_at)
        .execute(&mut *self.conn)
        .await?;

        debug!(movement_id = %movement.id, kind = ?movement.kind, "Stock movement recorded");
        Ok(movement)
    }
}
