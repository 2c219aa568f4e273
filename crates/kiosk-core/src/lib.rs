//! # kiosk-core: Pure Business Logic for Kiosk POS
//!
//! This crate is the **heart** of Kiosk POS. It contains the business rules
//! of the shop as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Kiosk POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Browser front-end                            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ JSON over HTTP (cookie session)        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    kiosk-api (axum)                             │   │
//! │  │    /auth, /products, /stock, /sales, /phones, /credits, ...     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ kiosk-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐   │   │
//! │  │   │   types   │  │ composite │  │ checkout  │  │  credit   │   │   │
//! │  │   │   money   │  │ pack_size │  │ validation│  │  report   │   │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘   │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    kiosk-db (Database Layer)                    │   │
//! │  │        SQLite, migrations, repositories, unit of work           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Sale, Phone, CreditPayment, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Field validation rules
//! - [`composite`] - Composite product (bun + sausage) resolution
//! - [`pack_size`] - Declarative pack-size table and intake normalization
//! - [`checkout`] - Stock check and totals of a sale
//! - [`credit`] - Credit terms and balances
//! - [`report`] - Bucketed summaries, top products, monthly report
//! - [`period`] - Month periods, monthly schedule, date filters
//! - [`message`] - Notification texts
//! - [`sku`] - SKU derivation from product names
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: the clock and every database read are passed in
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are minor units (i64)
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use kiosk_core::checkout::{sale_totals, SaleLine};
//! use kiosk_core::Money;
//!
//! let lines = vec![SaleLine {
//!     product_id: "a".into(),
//!     quantity: 10,
//!     unit_price: Money::from_minor(150),
//! }];
//! let totals = sale_totals(&lines, None);
//! assert_eq!(totals.total.minor(), 1500);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod composite;
pub mod credit;
pub mod error;
pub mod message;
pub mod money;
pub mod pack_size;
pub mod period;
pub mod report;
pub mod sku;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines in a single sale.
pub const MAX_SALE_LINES: usize = 100;

/// Maximum quantity of a single sale line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum units in a single stock intake or issue.
pub const MAX_INTAKE_QUANTITY: i64 = 100_000;

/// Largest accepted pack size.
pub const MAX_PACK_SIZE: i64 = 1_000;

/// Largest accepted amount in minor units (100,000,000.00).
///
/// Keeps every total well inside `i64`: the largest possible cart is
/// `MAX_SALE_LINES × MAX_ITEM_QUANTITY × MAX_MONEY` ≈ 10^15.
pub const MAX_MONEY: i64 = 10_000_000_000;
