//! # Phone Repository
//!
//! Second-hand phones tracked one by one (by IMEI), with their own
//! movement history. A phone is sold exactly once: the status update is
//! guarded on `status = 'in_stock'`.

use chrono::{DateTime, Utc};
use kiosk_core::period::DateRange;
use kiosk_core::{Money, Page, PageRequest, Phone, PhoneMovement, PhoneMovementType, PhoneSale, PhoneStatus};
use serde::Serialize;
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};

const PHONE_COLUMNS: &str =
    "id, imei, model, purchase_price, condition, sale_price, status, created_at, updated_at";

/// A phone with its movement history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneDetail {
    #[serde(flatten)]
    pub phone: Phone,
    pub movements: Vec<PhoneMovement>,
}

/// A phone movement joined with phone and user details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PhoneMovementView {
    pub id: String,
    pub phone_id: String,
    pub imei: String,
    pub model: String,
    #[serde(rename = "type")]
    pub kind: PhoneMovementType,
    pub purchase_price: Money,
    pub sale_price: Option<Money>,
    pub note: Option<String>,
    pub user_id: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// Filters for the phone movement history.
#[derive(Debug, Clone, Default)]
pub struct PhoneHistoryFilter {
    pub range: DateRange,
    pub kind: Option<PhoneMovementType>,
}

async fn fetch_phone<'e, E>(executor: E, id: &str) -> DbResult<Option<Phone>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {PHONE_COLUMNS} FROM phones WHERE id = ?1");
    let phone = sqlx::query_as::<_, Phone>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(phone)
}

/// Repository for reading phones.
#[derive(Debug, Clone)]
pub struct PhoneRepository {
    pool: SqlitePool,
}

impl PhoneRepository {
    /// Creates a new PhoneRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PhoneRepository { pool }
    }

    /// Lists phones newest first, optionally by status.
    pub async fn list(&self, status: Option<PhoneStatus>, page: PageRequest) -> DbResult<Page<Phone>> {
        debug!(?status, page = page.page, "Listing phones");

        let sql = format!(
            "SELECT {PHONE_COLUMNS} FROM phones WHERE (?1 IS NULL OR status = ?1) \
             ORDER BY created_at DESC, id LIMIT ?2 OFFSET ?3"
        );
        let items = sqlx::query_as::<_, Phone>(&sql)
            .bind(status)
            .bind(page.limit as i64)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM phones WHERE (?1 IS NULL OR status = ?1)")
            .bind(status)
            .fetch_one(&self.pool)
            .await?;

        Ok(page.wrap(items, total))
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Phone>> {
        fetch_phone(&self.pool, id).await
    }

    /// Gets a phone with its movements, oldest first.
    pub async fn get_detail(&self, id: &str) -> DbResult<Option<PhoneDetail>> {
        let Some(phone) = fetch_phone(&self.pool, id).await? else {
            return Ok(None);
        };

        let movements = sqlx::query_as::<_, PhoneMovement>(
            r#"
            SELECT id, phone_id, type AS kind, purchase_price, sale_price, note, user_id, created_at
            FROM phone_movements
            WHERE phone_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(PhoneDetail { phone, movements }))
    }

    /// Movement history across all phones, newest first.
    pub async fn history(
        &self,
        filter: &PhoneHistoryFilter,
        page: PageRequest,
    ) -> DbResult<Page<PhoneMovementView>> {
        const FROM_WHERE: &str = r#"
            FROM phone_movements m
            JOIN phones ph ON ph.id = m.phone_id
            JOIN users u ON u.id = m.user_id
            WHERE (?1 IS NULL OR m.created_at >= ?1)
              AND (?2 IS NULL OR m.created_at <= ?2)
              AND (?3 IS NULL OR m.type = ?3)
        "#;

        let sql = format!(
            "SELECT m.id, m.phone_id, ph.imei, ph.model, m.type AS kind, m.purchase_price, \
             m.sale_price, m.note, m.user_id, u.username, m.created_at \
             {FROM_WHERE} ORDER BY m.created_at DESC, m.id LIMIT ?4 OFFSET ?5"
        );
        let items = sqlx::query_as::<_, PhoneMovementView>(&sql)
            .bind(filter.range.from)
            .bind(filter.range.to)
            .bind(filter.kind)
            .bind(page.limit as i64)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) {FROM_WHERE}"))
            .bind(filter.range.from)
            .bind(filter.range.to)
            .bind(filter.kind)
            .fetch_one(&self.pool)
            .await?;

        Ok(page.wrap(items, total))
    }
}

/// Phone writes inside a [`UnitOfWork`](crate::UnitOfWork).
pub struct PhoneOps<'a> {
    conn: &'a mut SqliteConnection,
}

impl<'a> PhoneOps<'a> {
    pub(crate) fn new(conn: &'a mut SqliteConnection) -> Self {
        PhoneOps { conn }
    }

    pub async fn get(&mut self, id: &str) -> DbResult<Option<Phone>> {
        fetch_phone(&mut *self.conn, id).await
    }

    /// Inserts a phone. A known IMEI is a `UniqueViolation`.
    pub async fn insert(&mut self, phone: &Phone) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO phones
                (id, imei, model, purchase_price, condition, sale_price, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&phone.id)
        .bind(&phone.imei)
        .bind(&phone.model)
        .bind(phone.purchase_price)
        .bind(phone.condition)
        .bind(phone.sale_price)
        .bind(phone.status)
        .bind(phone.created_at)
        .bind(phone.updated_at)
        .execute(&mut *self.conn)
        .await
        .map_err(|e| DbError::from(e).with_duplicate_value(phone.imei.clone()))?;

        info!(phone_id = %phone.id, imei = %phone.imei, "Phone received");
        Ok(())
    }

    /// Marks an in-stock phone as sold. Returns `false` if it was not in
    /// stock any more.
    pub async fn mark_sold(&mut self, id: &str, sale_price: Money, at: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE phones SET status = 'sold', sale_price = ?2, updated_at = ?3
            WHERE id = ?1 AND status = 'in_stock'
            "#,
        )
        .bind(id)
        .bind(sale_price)
        .bind(at)
        .execute(&mut *self.conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn insert_movement(&mut self, movement: &PhoneMovement) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO phone_movements
                (id, phone_id, type, purchase_price, sale_price, note, user_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.phone_id)
        .bind(movement.kind)
        .bind(movement.purchase_price)
        .bind(movement.sale_price)
        .bind(&movement.note)
        .bind(&movement.user_id)
        .bind(movement.created_at)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    pub async fn insert_phone_sale(&mut self, phone_sale: &PhoneSale) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO phone_sales (id, sale_id, phone_id, sale_price, purchase_price)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&phone_sale.id)
        .bind(&phone_sale.sale_id)
        .bind(&phone_sale.phone_id)
        .bind(phone_sale.sale_price)
        .bind(phone_sale.purchase_price)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }
}
