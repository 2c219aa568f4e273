//! # Credit Repository
//!
//! The credit sub-ledger: credit sales and the installments paid against
//! them.
//!
//! ## Balance Invariant
//! ```text
//! initial_payment + Σ credit_payments.amount  ≤  sales.total
//! ```
//! The insert in [`CreditOps::insert_guarded`] re-checks this in the same
//! statement that writes the row.

use std::collections::HashMap;

use kiosk_core::credit::CreditBalance;
use kiosk_core::{CreditPayment, Money, Sale};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::sale::{PhoneSaleView, SALE_COLUMNS};
use crate::error::DbResult;

const PAYMENT_COLUMNS: &str = "id, sale_id, amount, note, user_id, created_at";

/// A credit sale with its payment state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditView {
    #[serde(flatten)]
    pub sale: Sale,
    pub total_paid: Money,
    pub remaining: Money,
    pub payments: Vec<CreditPayment>,
    pub phone: Option<PhoneSaleView>,
}

impl CreditView {
    fn new(sale: Sale, payments: Vec<CreditPayment>, phone: Option<PhoneSaleView>) -> Self {
        let amounts: Vec<Money> = payments.iter().map(|p| p.amount).collect();
        let balance = CreditBalance::new(sale.total, sale.initial_payment, &amounts);
        CreditView {
            sale,
            total_paid: balance.total_paid,
            remaining: balance.remaining,
            payments,
            phone,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PhoneSaleRow {
    sale_id: String,
    #[sqlx(flatten)]
    view: PhoneSaleView,
}

/// Repository for reading the credit sub-ledger.
#[derive(Debug, Clone)]
pub struct CreditRepository {
    pool: SqlitePool,
}

impl CreditRepository {
    /// Creates a new CreditRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CreditRepository { pool }
    }

    /// Every credit sale, newest first, with payments and balance.
    pub async fn list(&self) -> DbResult<Vec<CreditView>> {
        let sql = format!(
            "SELECT {SALE_COLUMNS} FROM sales s WHERE s.payment_method = 'credit' \
             ORDER BY s.created_at DESC, s.id"
        );
        let sales = sqlx::query_as::<_, Sale>(&sql).fetch_all(&self.pool).await?;

        let payments = sqlx::query_as::<_, CreditPayment>(
            r#"
            SELECT cp.id, cp.sale_id, cp.amount, cp.note, cp.user_id, cp.created_at
            FROM credit_payments cp
            JOIN sales s ON s.id = cp.sale_id
            WHERE s.payment_method = 'credit'
            ORDER BY cp.created_at, cp.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let phones = sqlx::query_as::<_, PhoneSaleRow>(
            r#"
            SELECT ps.sale_id, ps.phone_id, ph.model, ph.imei, ps.sale_price, ps.purchase_price
            FROM phone_sales ps
            JOIN phones ph ON ph.id = ps.phone_id
            JOIN sales s ON s.id = ps.sale_id
            WHERE s.payment_method = 'credit'
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut payments_by_sale: HashMap<String, Vec<CreditPayment>> = HashMap::new();
        for payment in payments {
            payments_by_sale
                .entry(payment.sale_id.clone())
                .or_default()
                .push(payment);
        }
        let mut phone_by_sale: HashMap<String, PhoneSaleView> =
            phones.into_iter().map(|row| (row.sale_id, row.view)).collect();

        debug!(count = sales.len(), "Credit sales loaded");
        Ok(sales
            .into_iter()
            .map(|sale| {
                let payments = payments_by_sale.remove(&sale.id).unwrap_or_default();
                let phone = phone_by_sale.remove(&sale.id);
                CreditView::new(sale, payments, phone)
            })
            .collect())
    }

    /// One credit sale. `None` if the sale is missing or not a credit sale.
    pub async fn get(&self, sale_id: &str) -> DbResult<Option<CreditView>> {
        let sql = format!(
            "SELECT {SALE_COLUMNS} FROM sales s WHERE s.id = ?1 AND s.payment_method = 'credit'"
        );
        let Some(sale) = sqlx::query_as::<_, Sale>(&sql)
            .bind(sale_id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let payments = sqlx::query_as::<_, CreditPayment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM credit_payments WHERE sale_id = ?1 ORDER BY created_at, id"
        ))
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        let phone = sqlx::query_as::<_, PhoneSaleView>(
            r#"
            SELECT ps.phone_id, ph.model, ph.imei, ps.sale_price, ps.purchase_price
            FROM phone_sales ps JOIN phones ph ON ph.id = ps.phone_id
            WHERE ps.sale_id = ?1
            "#,
        )
        .bind(sale_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(Some(CreditView::new(sale, payments, phone)))
    }
}

/// Credit ledger statements inside a [`UnitOfWork`](crate::UnitOfWork).
pub struct CreditOps<'a> {
    conn: &'a mut SqliteConnection,
}

impl<'a> CreditOps<'a> {
    pub(crate) fn new(conn: &'a mut SqliteConnection) -> Self {
        CreditOps { conn }
    }

    /// Amounts of every payment recorded against a sale.
    pub async fn payment_amounts(&mut self, sale_id: &str) -> DbResult<Vec<Money>> {
        let amounts: Vec<Money> =
            sqlx::query_scalar("SELECT amount FROM credit_payments WHERE sale_id = ?1")
                .bind(sale_id)
                .fetch_all(&mut *self.conn)
                .await?;
        Ok(amounts)
    }

    /// Inserts a payment only if the sale is a credit sale and the payment
    /// keeps the balance invariant. Returns `false` when the guard refused.
    pub async fn insert_guarded(&mut self, payment: &CreditPayment) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO credit_payments (id, sale_id, amount, note, user_id, created_at)
            SELECT ?1, ?2, ?3, ?4, ?5, ?6
            FROM sales s
            WHERE s.id = ?2
              AND s.payment_method = 'credit'
              AND COALESCE(s.initial_payment, 0)
                  + COALESCE((SELECT SUM(cp.amount) FROM credit_payments cp WHERE cp.sale_id = s.id), 0)
                  + ?3 <= s.total
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.sale_id)
        .bind(payment.amount)
        .bind(&payment.note)
        .bind(&payment.user_id)
        .bind(payment.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
