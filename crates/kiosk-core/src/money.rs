//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  A credit sale split into installments:                                 │
//! │    1000.00 - 200.00 over 3 months = 266.666... per month               │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units                                      │
//! │    80000 / 3 = 26667 per month (rounded, informational only)            │
//! │    The balance check always uses the exact integer total               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every price, cost, discount, total and payment in the system is a `Money`.
//! On the wire it is a plain JSON integer of minor units.
//!
//! ## Usage
//! ```rust
//! use kiosk_core::money::Money;
//!
//! let price = Money::from_minor(150);
//! let line = price.multiply_quantity(10);
//! assert_eq!(line.minor(), 1500);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: profit and "remaining" can legitimately go negative
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Transparent on the wire and in SQLite**: an INTEGER column, a JSON number
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Product.price ──► SaleItem.unit_price ──► line revenue ──► Sale.total │
/// │  Product.cost_price ──► SaleItem.unit_cost (fixed at sale time)        │
/// │  Sale.initial_payment + Σ CreditPayment.amount ≤ Sale.total            │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    ///
    /// ## Example
    /// ```rust
    /// use kiosk_core::money::Money;
    ///
    /// let price = Money::from_minor(1099);
    /// assert_eq!(price.minor(), 1099);
    /// ```
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Creates a Money value from major and minor parts.
    ///
    /// `from_major_minor(-5, 50)` is -5.50, not -4.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Clamps negative values to zero.
    ///
    /// ## Example
    /// ```rust
    /// use kiosk_core::money::Money;
    ///
    /// // A 20.00 discount on a 15.00 cart never produces a negative total
    /// let total = Money::from_minor(1500) - Money::from_minor(2000);
    /// assert_eq!(total.clamp_non_negative(), Money::zero());
    /// ```
    #[inline]
    pub const fn clamp_non_negative(self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            self
        }
    }

    /// Multiplies money by a quantity.
    ///
    /// ## User Workflow
    /// ```text
    /// Product: Sparkling Water 150
    /// Quantity: 10
    ///      │
    ///      ▼
    /// multiply_quantity(10) ← THIS FUNCTION
    ///      │
    ///      ▼
    /// Line total: 1500
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Money {
        Money(self.0 * qty)
    }

    /// Divides into `parts` equal shares, rounding half away from zero.
    ///
    /// Returns `None` for zero parts. Used for the informational monthly
    /// installment; balances are always checked against exact totals.
    pub fn divide_rounded(&self, parts: i64) -> Option<Money> {
        if parts == 0 {
            return None;
        }
        let amount = self.0 as i128;
        let parts = parts as i128;
        // Truncating division after a half-divisor bias away from zero
        let numerator = amount * 2 + amount.signum() * parts.abs();
        Some(Money((numerator / (parts * 2)) as i64))
    }
}

// =============================================================================
// Display Implementation
// =============================================================================

/// Formats money as `major.minor`, e.g. `1500` displays as `15.00`.
///
/// Used in notification texts and CSV exports. JSON always carries the
/// integer value.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

// =============================================================================
// Arithmetic Operations
// =============================================================================

impl Add for Money {
    type Output = Money;

    #[inline]
    fn add(self, other: Money) -> Money {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Money) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Money;

    #[inline]
    fn sub(self, other: Money) -> Money {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Money) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Money;

    #[inline]
    fn mul(self, qty: i64) -> Money {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_major_minor() {
        assert_eq!(Money::from_major_minor(10, 99).minor(), 1099);
        assert_eq!(Money::from_major_minor(-5, 50).minor(), -550);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_minor(1099).to_string(), "10.99");
        assert_eq!(Money::from_minor(500).to_string(), "5.00");
        assert_eq!(Money::from_minor(-550).to_string(), "-5.50");
        assert_eq!(Money::from_minor(-5).to_string(), "-0.05");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_minor(1000);
        let b = Money::from_minor(500);

        assert_eq!((a + b).minor(), 1500);
        assert_eq!((a - b).minor(), 500);
        assert_eq!((a * 3).minor(), 3000);

        let total: Money = [a, b, b].iter().sum();
        assert_eq!(total.minor(), 2000);
    }

    #[test]
    fn test_clamp_non_negative() {
        assert_eq!(Money::from_minor(-1).clamp_non_negative(), Money::zero());
        assert_eq!(Money::from_minor(7).clamp_non_negative().minor(), 7);
    }

    #[test]
    fn test_divide_rounded() {
        assert_eq!(Money::from_minor(80000).divide_rounded(3), Some(Money::from_minor(26667)));
        assert_eq!(Money::from_minor(80000).divide_rounded(4), Some(Money::from_minor(20000)));
        assert_eq!(Money::from_minor(5).divide_rounded(2), Some(Money::from_minor(3)));
        assert_eq!(Money::from_minor(-5).divide_rounded(2), Some(Money::from_minor(-3)));
        assert_eq!(Money::from_minor(100).divide_rounded(0), None);
    }

    #[test]
    fn test_json_is_plain_integer() {
        let json = serde_json::to_string(&Money::from_minor(1500)).unwrap();
        assert_eq!(json, "1500");
        let back: Money = serde_json::from_str("250").unwrap();
        assert_eq!(back.minor(), 250);
    }
}
