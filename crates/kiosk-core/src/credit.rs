//! # Credit Sub-Ledger Rules
//!
//! Credit terms for phone sales and the running balance of a credit sale.
//!
//! ## Balance Invariant
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Sale.total = 1000                                                      │
//! │                                                                         │
//! │  initial_payment   200 ─┐                                               │
//! │  payment #1        700 ─┼── total_paid = 900    remaining = 100         │
//! │                         │                                               │
//! │  payment #2 of 150 ─────┴── 900 + 150 > 1000 → PaymentExceedsRemaining  │
//! │  payment #2 of 100 ─────── 900 + 100 = 1000 → accepted, remaining = 0   │
//! │                                                                         │
//! │  initial_payment + Σ payments ≤ total   at every committed state        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `CreditBalance` is always built from values re-read inside the payment
//! transaction; nothing here caches a balance.

use serde::Serialize;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::PaymentMethod;
use crate::validation::{validate_non_negative_money, validate_positive_money};

/// Longest installment plan accepted, in months.
pub const MAX_CREDIT_MONTHS: i64 = 120;

/// Credit terms requested for a phone sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditRequest<'a> {
    pub sale_price: Money,
    pub initial_payment: Option<Money>,
    pub customer_first_name: Option<&'a str>,
    pub customer_last_name: Option<&'a str>,
    pub credit_months: Option<i64>,
}

/// Validated credit terms, ready to be stored on the sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditTerms {
    pub initial_payment: Money,
    pub monthly_payment: Money,
    pub credit_months: i64,
}

/// Validates credit terms and computes the monthly payment.
///
/// ## Rules
/// - `initial_payment` (default 0) is not negative and below `sale_price`
/// - the customer has a non-empty first or last name
/// - `credit_months` is in `1..=MAX_CREDIT_MONTHS`
/// - `monthly_payment = (sale_price - initial_payment) / credit_months`,
///   rounded half away from zero
///
/// ## Example
/// ```rust
/// use kiosk_core::credit::{credit_terms, CreditRequest};
/// use kiosk_core::Money;
///
/// let terms = credit_terms(&CreditRequest {
///     sale_price: Money::from_minor(100_000),
///     initial_payment: Some(Money::from_minor(20_000)),
///     customer_first_name: Some("Ann"),
///     customer_last_name: None,
///     credit_months: Some(4),
/// })
/// .unwrap();
/// assert_eq!(terms.monthly_payment, Money::from_minor(20_000));
/// ```
pub fn credit_terms(request: &CreditRequest<'_>) -> CoreResult<CreditTerms> {
    let invalid = |reason: &str| CoreError::InvalidCreditTerms {
        reason: reason.to_string(),
    };

    let initial_payment = request.initial_payment.unwrap_or_default();
    validate_non_negative_money("initialPayment", initial_payment)?;
    if initial_payment >= request.sale_price {
        return Err(invalid("initial payment must be less than the sale price"));
    }

    let has_name = [request.customer_first_name, request.customer_last_name]
        .iter()
        .flatten()
        .any(|n| !n.trim().is_empty());
    if !has_name {
        return Err(invalid("customer name is required"));
    }

    let credit_months = request
        .credit_months
        .ok_or_else(|| invalid("credit months are required"))?;
    if !(1..=MAX_CREDIT_MONTHS).contains(&credit_months) {
        return Err(invalid("credit months must be between 1 and 120"));
    }

    let monthly_payment = (request.sale_price - initial_payment)
        .divide_rounded(credit_months)
        .ok_or_else(|| invalid("credit months must be positive"))?;

    Ok(CreditTerms {
        initial_payment,
        monthly_payment,
        credit_months,
    })
}

/// Derived balance of a credit sale. Computed on read, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditBalance {
    pub total: Money,
    pub initial_payment: Money,
    pub total_paid: Money,
    pub remaining: Money,
}

impl CreditBalance {
    /// Builds the balance from the sale total, its initial payment and the
    /// amounts of every recorded installment.
    pub fn new(total: Money, initial_payment: Option<Money>, payments: &[Money]) -> Self {
        let initial_payment = initial_payment.unwrap_or_default();
        let total_paid = initial_payment + payments.iter().sum::<Money>();
        CreditBalance {
            total,
            initial_payment,
            total_paid,
            remaining: total - total_paid,
        }
    }

    /// Checks that a new payment keeps `total_paid ≤ total`.
    ///
    /// ## Errors
    /// - `Validation` when `amount` is not positive
    /// - `PaymentExceedsRemaining` naming the remaining balance
    pub fn admit_payment(&self, amount: Money) -> CoreResult<CreditBalance> {
        validate_positive_money("amount", amount)?;
        if self.total_paid + amount > self.total {
            return Err(CoreError::PaymentExceedsRemaining {
                remaining: self.remaining,
            });
        }
        Ok(CreditBalance {
            total_paid: self.total_paid + amount,
            remaining: self.remaining - amount,
            ..*self
        })
    }

    pub fn is_settled(&self) -> bool {
        !self.remaining.is_positive()
    }
}

/// Profit recognized on a phone sale.
///
/// Cash and card sales recognize the full margin immediately. Credit sales
/// recognize profit as it is collected: `total_paid - purchase_price`.
pub fn phone_sale_profit(
    payment_method: PaymentMethod,
    sale_price: Money,
    purchase_price: Money,
    total_paid: Money,
) -> Money {
    match payment_method {
        PaymentMethod::Credit => total_paid - purchase_price,
        PaymentMethod::Cash | PaymentMethod::Card => sale_price - purchase_price,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
