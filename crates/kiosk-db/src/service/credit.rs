//! # Credit Ledger
//!
//! Installments against phones sold on credit.
//!
//! ```text
//! total = 1000, initial = 200
//!   payment 700  → paid 900, remaining 100
//!   payment 150  → rejected: Payment exceeds remaining balance. Remaining: 1.00
//!   payment 100  → paid 1000, remaining 0
//! ```
//!
//! The balance is checked twice: once against a fresh read for a precise
//! error message, once inside the INSERT itself so the invariant
//! `initial + Σ payments ≤ total` holds even against a racing writer.

use kiosk_core::credit::CreditBalance;
use kiosk_core::{CoreError, CreditPayment, Money, PaymentMethod};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::error::DbResult;
use crate::repository::new_id;
use crate::unit_of_work::UnitOfWork;

/// Body of `POST /credits/payment`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCreditPayment {
    pub sale_id: String,
    pub amount: Money,
    pub note: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreditService {
    pool: SqlitePool,
}

impl CreditService {
    pub fn new(pool: SqlitePool) -> Self {
        CreditService { pool }
    }

    /// Records an installment.
    ///
    /// ## Errors
    /// - `Domain(NotFound)` for an unknown sale
    /// - `Domain(NotCreditSale)` for a cash or card sale
    /// - `Domain(Validation)` for a non-positive amount
    /// - `Domain(PaymentExceedsRemaining)` naming the remaining balance
    pub async fn record_payment(&self, input: &NewCreditPayment, user_id: &str) -> DbResult<CreditPayment> {
        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let now = uow.now();

        let sale = uow
            .sales()
            .get(&input.sale_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Sale", input.sale_id.clone()))?;
        if sale.payment_method != PaymentMethod::Credit {
            return Err(CoreError::NotCreditSale { sale_id: sale.id }.into());
        }

        let paid = uow.credits().payment_amounts(&sale.id).await?;
        let balance = CreditBalance::new(sale.total, sale.initial_payment, &paid)
            .admit_payment(input.amount)?;

        let payment = CreditPayment {
            id: new_id(),
            sale_id: sale.id.clone(),
            amount: input.amount,
            note: input
                .note
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            user_id: user_id.to_string(),
            created_at: now,
        };

        if !uow.credits().insert_guarded(&payment).await? {
            let paid = uow.credits().payment_amounts(&sale.id).await?;
            let remaining = CreditBalance::new(sale.total, sale.initial_payment, &paid).remaining;
            warn!(sale_id = %sale.id, %remaining, "Credit guard rejected payment");
            return Err(CoreError::PaymentExceedsRemaining { remaining }.into());
        }

        uow.commit().await?;

        info!(
            sale_id = %sale.id,
            amount = %payment.amount,
            remaining = %balance.remaining,
            "Credit payment recorded"
        );
        Ok(payment)
    }
}
