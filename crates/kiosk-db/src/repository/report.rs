//! # Report Data
//!
//! Loads the facts the report aggregations in `kiosk_core::report` run
//! over. Aggregation itself stays in kiosk-core; this module only selects
//! rows.
//!
//! ```text
//! sales ──┬── LEFT JOIN phone_sales ──► SaleFact  (total, method, paid so far, phone)
//!         └── sale_items ⋈ products ──► LineFact  (qty, price, frozen unit cost)
//! ```

use chrono::{DateTime, Utc};
use kiosk_core::period::DateRange;
use kiosk_core::report::{LineFact, PhoneFact, SaleFact};
use kiosk_core::{Money, PaymentMethod};
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

#[derive(sqlx::FromRow)]
struct SaleFactRow {
    sale_id: String,
    created_at: DateTime<Utc>,
    total: Money,
    payment_method: PaymentMethod,
    total_paid: Money,
    phone_sale_price: Option<Money>,
    phone_purchase_price: Option<Money>,
}

impl From<SaleFactRow> for SaleFact {
    fn from(row: SaleFactRow) -> Self {
        let phone = match (row.phone_sale_price, row.phone_purchase_price) {
            (Some(sale_price), Some(purchase_price)) => Some(PhoneFact {
                sale_price,
                purchase_price,
            }),
            _ => None,
        };
        SaleFact {
            sale_id: row.sale_id,
            created_at: row.created_at,
            total: row.total,
            payment_method: row.payment_method,
            total_paid: row.total_paid,
            phone,
        }
    }
}

async fn sale_facts<'e, E>(executor: E, range: DateRange) -> DbResult<Vec<SaleFact>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, SaleFactRow>(
        r#"
        SELECT s.id AS sale_id,
               s.created_at,
               s.total,
               s.payment_method,
               CASE WHEN s.payment_method = 'credit'
                    THEN COALESCE(s.initial_payment, 0)
                         + COALESCE((SELECT SUM(cp.amount) FROM credit_payments cp
                                     WHERE cp.sale_id = s.id), 0)
                    ELSE s.total
               END AS total_paid,
               ps.sale_price AS phone_sale_price,
               ps.purchase_price AS phone_purchase_price
        FROM sales s
        LEFT JOIN phone_sales ps ON ps.sale_id = s.id
        WHERE (?1 IS NULL OR s.created_at >= ?1)
          AND (?2 IS NULL OR s.created_at <= ?2)
        ORDER BY s.created_at, s.id
        "#,
    )
    .bind(range.from)
    .bind(range.to)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(SaleFact::from).collect())
}

async fn line_facts<'e, E>(
    executor: E,
    range: DateRange,
    category_id: Option<&str>,
) -> DbResult<Vec<LineFact>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let lines = sqlx::query_as::<_, LineFact>(
        r#"
        SELECT i.sale_id,
               s.created_at,
               i.product_id,
               p.name AS product_name,
               i.quantity,
               i.unit_price,
               i.unit_cost
        FROM sale_items i
        JOIN sales s ON s.id = i.sale_id
        JOIN products p ON p.id = i.product_id
        WHERE (?1 IS NULL OR s.created_at >= ?1)
          AND (?2 IS NULL OR s.created_at <= ?2)
          AND (?3 IS NULL OR p.category_id = ?3)
        ORDER BY s.created_at, s.id, i.rowid
        "#,
    )
    .bind(range.from)
    .bind(range.to)
    .bind(category_id)
    .fetch_all(executor)
    .await?;

    Ok(lines)
}

/// Repository for report facts.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    /// Creates a new ReportRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// One fact per sale in range (goods and phone sales).
    pub async fn sale_facts(&self, range: DateRange) -> DbResult<Vec<SaleFact>> {
        let facts = sale_facts(&self.pool, range).await?;
        debug!(count = facts.len(), "Sale facts loaded");
        Ok(facts)
    }

    /// One fact per sale item in range, optionally for one category.
    pub async fn line_facts(&self, range: DateRange, category_id: Option<&str>) -> DbResult<Vec<LineFact>> {
        let facts = line_facts(&self.pool, range, category_id).await?;
        debug!(count = facts.len(), category = ?category_id, "Line facts loaded");
        Ok(facts)
    }
}

/// Report reads inside a [`UnitOfWork`](crate::UnitOfWork), so a report
/// and the job claim that publishes it see the same snapshot.
pub struct ReportOps<'a> {
    conn: &'a mut SqliteConnection,
}

impl<'a> ReportOps<'a> {
    pub(crate) fn new(conn: &'a mut SqliteConnection) -> Self {
        ReportOps { conn }
    }

    pub async fn sale_facts(&mut self, range: DateRange) -> DbResult<Vec<SaleFact>> {
        sale_facts(&mut *self.conn, range).await
    }

    pub async fn line_facts(&mut self, range: DateRange) -> DbResult<Vec<LineFact>> {
        line_facts(&mut *self.conn, range, None).await
    }
}
