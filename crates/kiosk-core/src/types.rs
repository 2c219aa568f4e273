//! # Domain Types
//!
//! Core domain types used throughout Kiosk POS.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Catalog                 Inventory ledger          Sales                │
//! │  ┌──────────────┐        ┌──────────────────┐      ┌────────────────┐  │
//! │  │ Category     │        │ StockMovement    │      │ Sale           │  │
//! │  │ Product ─────┼──bun──►│  IN/OUT/SALE/    │      │  SaleItem      │  │
//! │  │   (composite)│──saus─►│  ADJUST          │      │  (unit_cost    │  │
//! │  └──────────────┘        └──────────────────┘      │   fixed)       │  │
//! │                                                     └───────┬────────┘  │
//! │  Phone sub-ledger                                           │           │
//! │  ┌──────────────┐   ┌──────────────┐   ┌─────────────────┐ │           │
//! │  │ Phone (IMEI) │──►│ PhoneSale    │──►│ CreditPayment   │◄┘           │
//! │  │ PhoneMovement│   │ (snapshots)  │   │ (installments)  │             │
//! │  └──────────────┘   └──────────────┘   └─────────────────┘             │
//! │                                                                         │
//! │  User (ADMIN | STAFF) is attributed on sales, movements, payments       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Every entity has a UUID v4 `id` stored as TEXT. Business keys (SKU, IMEI,
//! username, category name) are unique but never used for relations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Role
// =============================================================================

/// Access role of a user.
///
/// Exactly two roles exist. ADMIN manages catalog, stock, phones and users;
/// STAFF sells and records credit payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum Role {
    Admin,
    Staff,
}

impl Role {
    /// Returns the wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Staff => "STAFF",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Role::Admin),
            "STAFF" => Ok(Role::Staff),
            _ => Err(ValidationError::NotAllowed {
                field: "role".to_string(),
                allowed: vec!["ADMIN".to_string(), "STAFF".to_string()],
            }),
        }
    }
}

// =============================================================================
// User
// =============================================================================

/// A user account. The password hash never leaves the database layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub role: Role,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Catalog
// =============================================================================

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Category {
    pub id: String,

    /// Unique display name.
    pub name: String,

    /// Pack size applied on intake to products of this category that have
    /// no explicit pack size of their own.
    pub default_pack_size: Option<i64>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A product available for sale.
///
/// ## Composite Products
/// A composite product (`is_composite = true`) holds no stock of its own.
/// Selling one consumes one unit of the bun component and
/// `sausages_per_unit` units of the sausage component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Product {
    pub id: String,

    pub name: String,

    /// Stock Keeping Unit - unique business identifier.
    pub sku: String,

    pub category_id: Option<String>,

    /// Sale price.
    pub price: Money,

    /// Last known unit cost.
    pub cost_price: Money,

    /// Units on hand. Never negative after a committed transaction.
    pub stock: i64,

    pub is_active: bool,

    /// Units per purchased pack. 1 means "not packaged".
    pub pack_size: i64,

    pub is_composite: bool,

    pub bun_component_id: Option<String>,

    pub sausage_component_id: Option<String>,

    pub sausages_per_unit: Option<i64>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Checks whether `quantity` units can be taken from stock.
    #[inline]
    pub fn can_issue(&self, quantity: i64) -> bool {
        self.stock - quantity >= 0
    }
}

// =============================================================================
// Inventory Ledger
// =============================================================================

/// Kind of inventory-affecting event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum MovementType {
    /// Goods received.
    In,
    /// Goods issued (write-off, internal use).
    Out,
    /// Goods sold through a sale.
    Sale,
    /// Manual correction.
    Adjust,
}

impl MovementType {
    /// Sign of the stock delta this movement represents.
    pub fn sign(&self) -> i64 {
        match self {
            MovementType::In | MovementType::Adjust => 1,
            MovementType::Out | MovementType::Sale => -1,
        }
    }
}

impl FromStr for MovementType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "IN" => Ok(MovementType::In),
            "OUT" => Ok(MovementType::Out),
            "SALE" => Ok(MovementType::Sale),
            "ADJUST" => Ok(MovementType::Adjust),
            _ => Err(ValidationError::NotAllowed {
                field: "type".to_string(),
                allowed: ["IN", "OUT", "SALE", "ADJUST"].map(String::from).to_vec(),
            }),
        }
    }
}

/// Append-only audit record of a single stock event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    #[serde(rename = "type")]
    pub kind: MovementType,
    /// Always positive; direction comes from `kind`.
    pub quantity: i64,
    pub unit_price: Option<Money>,
    pub unit_cost: Option<Money>,
    pub note: Option<String>,
    pub user_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sales
// =============================================================================

/// How a sale was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum PaymentMethod {
    Cash,
    Card,
    /// Paid over time through CreditPayment records.
    Credit,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Credit => "credit",
        }
    }
}

/// A committed sale. Immutable except through its CreditPayment children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Sale {
    pub id: String,
    /// Cashier who rang the sale.
    pub user_id: String,
    /// Post-discount total, never negative.
    pub total: Money,
    pub discount: Option<Money>,
    pub payment_method: PaymentMethod,
    pub customer_first_name: Option<String>,
    pub customer_last_name: Option<String>,
    pub initial_payment: Option<Money>,
    pub monthly_payment: Option<Money>,
    pub credit_months: Option<i64>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// One line of a sale with the cost fixed at the moment of sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Money,
    /// Cost of goods at sale time. 0 for composite products.
    pub unit_cost: Money,
}

impl SaleItem {
    /// Revenue of this line.
    pub fn revenue(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }

    /// Profit of this line: `(unit_price - unit_cost) × quantity`.
    pub fn profit(&self) -> Money {
        (self.unit_price - self.unit_cost).multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Phones
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum PhoneCondition {
    New,
    Used,
}

/// Lifecycle of a phone: `in_stock` → `sold`, exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PhoneStatus {
    InStock,
    Sold,
}

impl FromStr for PhoneStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_stock" => Ok(PhoneStatus::InStock),
            "sold" => Ok(PhoneStatus::Sold),
            _ => Err(ValidationError::NotAllowed {
                field: "status".to_string(),
                allowed: vec!["in_stock".to_string(), "sold".to_string()],
            }),
        }
    }
}

/// A single uniquely identified phone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Phone {
    pub id: String,
    pub imei: String,
    pub model: String,
    pub purchase_price: Money,
    pub condition: PhoneCondition,
    /// Suggested sale price.
    pub sale_price: Option<Money>,
    pub status: PhoneStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum PhoneMovementType {
    In,
    Sale,
}

impl FromStr for PhoneMovementType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "IN" => Ok(PhoneMovementType::In),
            "SALE" => Ok(PhoneMovementType::Sale),
            _ => Err(ValidationError::NotAllowed {
                field: "type".to_string(),
                allowed: vec!["IN".to_string(), "SALE".to_string()],
            }),
        }
    }
}

/// Append-only log entry for a phone, with price snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PhoneMovement {
    pub id: String,
    pub phone_id: String,
    #[serde(rename = "type")]
    pub kind: PhoneMovementType,
    pub purchase_price: Money,
    pub sale_price: Option<Money>,
    pub note: Option<String>,
    pub user_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Links a sale to the phone it sold, with the prices at sale time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PhoneSale {
    pub id: String,
    pub sale_id: String,
    pub phone_id: String,
    pub sale_price: Money,
    pub purchase_price: Money,
}

/// An installment paid against a credit sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreditPayment {
    pub id: String,
    pub sale_id: String,
    pub amount: Money,
    pub note: Option<String>,
    pub user_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Pagination
// =============================================================================

/// A page of results: `{items, total, page, limit}` on the wire.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

/// Normalized page request.
///
/// ## Example
/// ```rust
/// use kiosk_core::types::PageRequest;
///
/// // limit clamped into 1..=100, page at least 1
/// let req = PageRequest::new(Some(0), Some(500), 20, 100);
/// assert_eq!(req.page, 1);
/// assert_eq!(req.limit, 100);
/// assert_eq!(req.offset(), 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// Builds a request from optional query values, applying the default
    /// limit and clamping into `1..=max_limit`.
    pub fn new(page: Option<u32>, limit: Option<u32>, default_limit: u32, max_limit: u32) -> Self {
        PageRequest {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, max_limit),
        }
    }

    /// Row offset for SQL `OFFSET`.
    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }

    /// Wraps a result set.
    pub fn wrap<T>(&self, items: Vec<T>, total: i64) -> Page<T> {
        Page {
            items,
            total,
            page: self.page,
            limit: self.limit,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
