//! # Sale Repository
//!
//! Database operations for sales and sale items.
//!
//! ## Sale Structure
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Sale Data Model                                 │
//! │                                                                         │
//! │  ┌───────────────────────────────────────────┐                          │
//! │  │                 SALE                      │                          │
//! │  │  id, user_id, total, discount             │                          │
//! │  │  payment_method (cash | card | credit)    │                          │
//! │  │  customer + credit terms (credit only)    │                          │
//! │  └─────────────────────┬─────────────────────┘                          │
//! │            ┌───────────┴───────────┐                                    │
//! │            ▼                       ▼                                    │
//! │  ┌─────────────────────┐  ┌─────────────────────┐                       │
//! │  │    SALE_ITEMS       │  │    PHONE_SALES      │                       │
//! │  │  goods sales        │  │  phone sales (1:1)  │                       │
//! │  │  unit_price         │  │  sale_price         │                       │
//! │  │  unit_cost (frozen) │  │  purchase_price     │                       │
//! │  └─────────────────────┘  └─────────────────────┘                       │
//! │                                                                         │
//! │  Sales are immutable once committed.                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use kiosk_core::period::DateRange;
use kiosk_core::{Money, Page, PageRequest, PaymentMethod, Sale, SaleItem};
use serde::Serialize;
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

pub(crate) const SALE_COLUMNS: &str = "s.id, s.user_id, s.total, s.discount, s.payment_method, \
     s.customer_first_name, s.customer_last_name, s.initial_payment, s.monthly_payment, \
     s.credit_months, s.created_at";

/// A sale row for lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SaleView {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub sale: Sale,
    pub username: String,
    pub item_count: i64,
}

/// A sale item with its product name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SaleItemView {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    pub sku: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub unit_cost: Money,
}

/// The phone side of a phone sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PhoneSaleView {
    pub phone_id: String,
    pub model: String,
    pub imei: String,
    pub sale_price: Money,
    pub purchase_price: Money,
}

/// A sale with everything needed to print it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleDetail {
    #[serde(flatten)]
    pub sale: Sale,
    pub username: String,
    pub items: Vec<SaleItemView>,
    pub phone: Option<PhoneSaleView>,
}

/// One exported line: a sale item, or the phone of a phone sale.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SaleExportRow {
    pub sale_id: String,
    pub created_at: DateTime<Utc>,
    pub payment_method: PaymentMethod,
    pub username: String,
    pub product_name: String,
    pub sku: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub unit_cost: Money,
    pub sale_total: Money,
}

pub(crate) async fn fetch_sale<'e, E>(executor: E, id: &str) -> DbResult<Option<Sale>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {SALE_COLUMNS} FROM sales s WHERE s.id = ?1");
    let sale = sqlx::query_as::<_, Sale>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(sale)
}

/// Repository for reading sales.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Lists sales newest first.
    pub async fn list(&self, range: DateRange, page: PageRequest) -> DbResult<Page<SaleView>> {
        debug!(?range, page = page.page, "Listing sales");

        const WHERE: &str = "WHERE (?1 IS NULL OR s.created_at >= ?1) AND (?2 IS NULL OR s.created_at <= ?2)";

        let sql = format!(
            "SELECT {SALE_COLUMNS}, u.username, \
               (SELECT COUNT(*) FROM sale_items i WHERE i.sale_id = s.id) AS item_count \
             FROM sales s JOIN users u ON u.id = s.user_id {WHERE} \
             ORDER BY s.created_at DESC, s.id LIMIT ?3 OFFSET ?4"
        );
        let items = sqlx::query_as::<_, SaleView>(&sql)
            .bind(range.from)
            .bind(range.to)
            .bind(page.limit as i64)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM sales s {WHERE}"))
            .bind(range.from)
            .bind(range.to)
            .fetch_one(&self.pool)
            .await?;

        Ok(page.wrap(items, total))
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Sale>> {
        fetch_sale(&self.pool, id).await
    }

    /// Gets a sale with its items, seller and phone.
    pub async fn get_detail(&self, id: &str) -> DbResult<Option<SaleDetail>> {
        let Some(sale) = fetch_sale(&self.pool, id).await? else {
            return Ok(None);
        };

        let username: String = sqlx::query_scalar("SELECT username FROM users WHERE id = ?1")
            .bind(&sale.user_id)
            .fetch_optional(&self.pool)
            .await?
            .unwrap_or_else(|| sale.user_id.clone());

        let items = sqlx::query_as::<_, SaleItemView>(
            r#"
            SELECT i.id, i.product_id, p.name AS product_name, p.sku,
                   i.quantity, i.unit_price, i.unit_cost
            FROM sale_items i
            JOIN products p ON p.id = i.product_id
            WHERE i.sale_id = ?1
            ORDER BY i.rowid
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let phone = sqlx::query_as::<_, PhoneSaleView>(
            r#"
            SELECT ps.phone_id, ph.model, ph.imei, ps.sale_price, ps.purchase_price
            FROM phone_sales ps
            JOIN phones ph ON ph.id = ps.phone_id
            WHERE ps.sale_id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(Some(SaleDetail {
            sale,
            username,
            items,
            phone,
        }))
    }

    /// Every sold line in range, oldest first, for CSV export.
    pub async fn export_rows(&self, range: DateRange) -> DbResult<Vec<SaleExportRow>> {
        let rows = sqlx::query_as::<_, SaleExportRow>(
            r#"
            SELECT * FROM (
                SELECT s.id AS sale_id, s.created_at, s.payment_method, u.username,
                       p.name AS product_name, p.sku, i.quantity, i.unit_price,
                       i.unit_cost, s.total AS sale_total
                FROM sale_items i
                JOIN sales s ON s.id = i.sale_id
                JOIN products p ON p.id = i.product_id
                JOIN users u ON u.id = s.user_id
                WHERE (?1 IS NULL OR s.created_at >= ?1) AND (?2 IS NULL OR s.created_at <= ?2)
                UNION ALL
                SELECT s.id, s.created_at, s.payment_method, u.username,
                       ph.model, ph.imei, 1, ps.sale_price, ps.purchase_price, s.total
                FROM phone_sales ps
                JOIN sales s ON s.id = ps.sale_id
                JOIN phones ph ON ph.id = ps.phone_id
                JOIN users u ON u.id = s.user_id
                WHERE (?1 IS NULL OR s.created_at >= ?1) AND (?2 IS NULL OR s.created_at <= ?2)
            )
            ORDER BY created_at, sale_id
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Raw items of a sale.
    pub async fn items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(
            "SELECT id, sale_id, product_id, quantity, unit_price, unit_cost \
             FROM sale_items WHERE sale_id = ?1 ORDER BY rowid",
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// Sale writes inside a [`UnitOfWork`](crate::UnitOfWork).
pub struct SaleOps<'a> {
    conn: &'a mut SqliteConnection,
}

impl<'a> SaleOps<'a> {
    pub(crate) fn new(conn: &'a mut SqliteConnection) -> Self {
        SaleOps { conn }
    }

    pub async fn get(&mut self, id: &str) -> DbResult<Option<Sale>> {
        fetch_sale(&mut *self.conn, id).await
    }

    /// Inserts the sale header.
    pub async fn insert_sale(&mut self, sale: &Sale) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sales (
                id, user_id, total, discount, payment_method,
                customer_first_name, customer_last_name,
                initial_payment, monthly_payment, credit_months, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.user_id)
        .bind(sale.total)
        .bind(sale.discount)
        .bind(sale.payment_method)
        .bind(&sale.customer_first_name)
        .bind(&sale.customer_last_name)
        .bind(sale.initial_payment)
        .bind(sale.monthly_payment)
        .bind(sale.credit_months)
        .bind(sale.created_at)
        .execute(&mut *self.conn)
        .await?;

        debug!(sale_id = %sale.id, "Sale header inserted");
        Ok(())
    }

    /// Inserts a line item. `unit_cost` is frozen from here on.
    pub async fn insert_item(&mut self, item: &SaleItem) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sale_items (id, sale_id, product_id, quantity, unit_price, unit_cost)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&item.id)
        .bind(&item.sale_id)
        .bind(&item.product_id)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.unit_cost)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }
}
