//! # Validation Module
//!
//! Input validation utilities for Kiosk POS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP extractor (kiosk-api)                                   │
//! │  ├── JSON shape, types, enum values                                    │
//! │  └── Rejections become 422 VALIDATION_ERROR                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Field rules (lengths, ranges, formats)                            │
//! │  └── Runs before a transaction is opened                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  ├── UNIQUE (sku, imei, username, category name) → 409                 │
//! │  └── Foreign keys (delete of referenced rows) → 409                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use kiosk_core::validation::{validate_sku, validate_quantity};
//!
//! validate_sku("HOTDOG-2").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::{MAX_INTAKE_QUANTITY, MAX_ITEM_QUANTITY, MAX_MONEY, MAX_PACK_SIZE};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

fn required(field: &str) -> ValidationError {
    ValidationError::Required {
        field: field.to_string(),
    }
}

/// Trims `value` and checks it is non-empty and at most `max` characters.
fn validate_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();
    if value.is_empty() {
        return Err(required(field));
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Only letters, digits, hyphens and underscores
///
/// ## Example
/// ```rust
/// use kiosk_core::validation::validate_sku;
///
/// assert!(validate_sku("HOTDOG-2").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("A".repeat(100).as_str()).is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    validate_text("sku", sku, 50)?;

    if !sku
        .trim()
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a product name (1..=200 characters).
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    validate_text("name", name, 200)
}

/// Validates a category name (1..=100 characters).
pub fn validate_category_name(name: &str) -> ValidationResult<()> {
    validate_text("name", name, 100)
}

/// Validates a username (1..=50 characters, no whitespace).
pub fn validate_username(username: &str) -> ValidationResult<()> {
    validate_text("username", username, 50)?;
    if username.trim().chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: "username".to_string(),
            reason: "must not contain spaces".to_string(),
        });
    }
    Ok(())
}

/// Validates a password. Any non-empty value up to 128 characters.
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(required("password"));
    }
    if password.chars().count() > 128 {
        return Err(ValidationError::TooLong {
            field: "password".to_string(),
            max: 128,
        });
    }
    Ok(())
}

/// Validates a phone IMEI.
///
/// ## Rules
/// - Must not be empty
/// - At most 32 characters
/// - Only ASCII letters and digits (serials of refurbished units are not
///   always pure digits)
///
/// ## Example
/// ```rust
/// use kiosk_core::validation::validate_imei;
///
/// assert!(validate_imei("356938035643809").is_ok());
/// assert!(validate_imei("35 69").is_err());
/// ```
pub fn validate_imei(imei: &str) -> ValidationResult<()> {
    validate_text("imei", imei, 32)?;
    if !imei.trim().chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::InvalidFormat {
            field: "imei".to_string(),
            reason: "must contain only letters and digits".to_string(),
        });
    }
    Ok(())
}

/// Validates a phone model name (1..=100 characters).
pub fn validate_phone_model(model: &str) -> ValidationResult<()> {
    validate_text("model", model, 100)
}

/// Validates a search query.
///
/// ## Rules
/// - Can be empty (returns all results)
/// - Maximum 100 characters
///
/// ## Returns
/// The trimmed query string.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.chars().count() > 100 {
        return Err(ValidationError::TooLong {
            field: "search".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a sale line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  POST /sales  { items: [{ quantity: 5, ... }] }                         │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_quantity(5) ← THIS FUNCTION                                   │
/// │       │                                                                 │
/// │       ├── qty <= 0? → 422 "quantity must be positive"                   │
/// │       ├── qty > 999? → 422 "quantity must be between 1 and 999"         │
/// │       └── OK → open the sale transaction                                │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    validate_bounded_quantity(qty, MAX_ITEM_QUANTITY)
}

/// Validates a stock intake or issue quantity (1..=MAX_INTAKE_QUANTITY).
pub fn validate_stock_quantity(qty: i64) -> ValidationResult<()> {
    validate_bounded_quantity(qty, MAX_INTAKE_QUANTITY)
}

fn validate_bounded_quantity(qty: i64, max: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > max {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max,
        });
    }

    Ok(())
}

/// Validates a pack size (1..=MAX_PACK_SIZE).
pub fn validate_pack_size(size: i64) -> ValidationResult<()> {
    if !(1..=MAX_PACK_SIZE).contains(&size) {
        return Err(ValidationError::OutOfRange {
            field: "packSize".to_string(),
            min: 1,
            max: MAX_PACK_SIZE,
        });
    }
    Ok(())
}

/// Validates sausages per composite unit (1..=10).
pub fn validate_sausages_per_unit(n: i64) -> ValidationResult<()> {
    if !(1..=10).contains(&n) {
        return Err(ValidationError::OutOfRange {
            field: "sausagesPerUnit".to_string(),
            min: 1,
            max: 10,
        });
    }
    Ok(())
}

/// Validates an amount that may be zero (prices, costs, discounts).
///
/// Amounts above [`MAX_MONEY`] are rejected so totals cannot overflow.
///
/// ## Example
/// ```rust
/// use kiosk_core::validation::validate_non_negative_money;
/// use kiosk_core::Money;
///
/// assert!(validate_non_negative_money("price", Money::from_minor(0)).is_ok());
/// assert!(validate_non_negative_money("price", Money::from_minor(-100)).is_err());
/// assert!(validate_non_negative_money("price", Money::from_minor(i64::MAX)).is_err());
/// ```
pub fn validate_non_negative_money(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    validate_money_ceiling(field, amount, 0)
}

/// Validates an amount that must be strictly positive (payments).
pub fn validate_positive_money(field: &str, amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    validate_money_ceiling(field, amount, 1)
}

fn validate_money_ceiling(field: &str, amount: Money, min: i64) -> ValidationResult<()> {
    if amount.minor() > MAX_MONEY {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min,
            max: MAX_MONEY,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("HOTDOG-2").is_ok());
        assert!(validate_sku("ABC123").is_ok());
        assert!(validate_sku("bun_half").is_ok());

        assert!(validate_sku("").is_err());
        assert!(validate_sku("   ").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_names() {
        assert!(validate_product_name("Hot Dog Double").is_ok());
        assert!(validate_product_name("").is_err());
        assert!(validate_product_name(&"A".repeat(300)).is_err());
        assert!(validate_category_name("Sausages").is_ok());
        assert!(validate_category_name(" ").is_err());
    }

    #[test]
    fn test_validate_username_and_password() {
        assert!(validate_username("cashier1").is_ok());
        assert!(validate_username("two words").is_err());
        assert!(validate_password("x").is_ok());
        assert!(validate_password("").is_err());
    }

    #[test]
    fn test_validate_imei() {
        assert!(validate_imei("356938035643809").is_ok());
        assert!(validate_imei("").is_err());
        assert!(validate_imei("3569-3803").is_err());
        assert!(validate_imei(&"1".repeat(40)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());

        assert!(validate_stock_quantity(5000).is_ok());
        assert!(validate_stock_quantity(0).is_err());
    }

    #[test]
    fn test_validate_money() {
        assert!(validate_non_negative_money("price", Money::zero()).is_ok());
        assert!(validate_non_negative_money("price", Money::from_minor(-1)).is_err());
        assert!(validate_positive_money("amount", Money::zero()).is_err());
        assert!(validate_positive_money("amount", Money::from_minor(1)).is_ok());

        assert!(validate_non_negative_money("price", Money::from_minor(MAX_MONEY)).is_ok());
        assert!(matches!(
            validate_non_negative_money("price", Money::from_minor(MAX_MONEY + 1)),
            Err(ValidationError::OutOfRange { max: MAX_MONEY, .. })
        ));
        assert!(validate_positive_money("amount", Money::from_minor(i64::MAX)).is_err());
    }

    #[test]
    fn test_validate_pack_size() {
        assert!(validate_pack_size(1).is_ok());
        assert!(validate_pack_size(12).is_ok());
        assert!(validate_pack_size(0).is_err());
        assert!(validate_sausages_per_unit(2).is_ok());
        assert!(validate_sausages_per_unit(0).is_err());
    }
}
