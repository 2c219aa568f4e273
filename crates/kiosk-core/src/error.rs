//! # Error Types
//!
//! Domain-specific error types for kiosk-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  kiosk-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  kiosk-db errors (separate crate)                                      │
//! │  └── DbError          - Database failures, wraps CoreError raised       │
//! │                         inside a transaction                            │
//! │                                                                         │
//! │  kiosk-api errors (in app)                                             │
//! │  └── ApiError         - HTTP status + JSON body                        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Client       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// Every variant maps to exactly one HTTP status at the API boundary.
/// Raising one of these inside a transaction aborts it before any write
/// becomes visible.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A referenced entity does not exist.
    ///
    /// ## When This Occurs
    /// - Sale line references an unknown product id
    /// - Credit payment references an unknown sale
    /// - Phone sale references an unknown phone
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Not enough stock on hand to complete the operation.
    ///
    /// `name` is the product or composite component that is short.
    ///
    /// ## User Workflow
    /// ```text
    /// Sell 3 hot dogs (2 sausages each)
    ///      │
    ///      ▼
    /// Sausage component stock: 4, required: 6
    ///      │
    ///      ▼
    /// InsufficientStock { name: "Sausage", available: 4, requested: 6 }
    /// ```
    #[error("Insufficient stock for {name}: available {available}, requested {requested}")]
    InsufficientStock {
        name: String,
        available: i64,
        requested: i64,
    },

    /// Composite product is missing (or points at an unusable) component.
    #[error("Product {product} is misconfigured: {reason}")]
    Configuration { product: String, reason: String },

    /// Phone exists but was already sold.
    #[error("Phone {imei} is not in stock")]
    PhoneNotAvailable { imei: String },

    /// Credit payment against a sale that was not made on credit.
    #[error("Sale {sale_id} is not a credit sale")]
    NotCreditSale { sale_id: String },

    /// Payment would push the collected amount above the sale total.
    #[error("Payment exceeds remaining balance. Remaining: {remaining}")]
    PaymentExceedsRemaining { remaining: crate::Money },

    /// Credit terms supplied with a credit sale are not acceptable.
    #[error("Invalid credit terms: {reason}")]
    InvalidCreditTerms { reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., malformed IMEI, unparseable date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
