//! # kiosk-db: Database Layer for Kiosk POS
//!
//! SQLite persistence for the shop: pool, embedded migrations, repositories
//! for reads, and the transactional services every write goes through.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Kiosk POS Data Flow                              │
//! │                                                                         │
//! │  axum handler (POST /sales)                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     kiosk-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐   │   │
//! │  │   │   Services    │    │  UnitOfWork   │    │ Repositories │   │   │
//! │  │   │               │    │               │    │              │   │   │
//! │  │   │ CheckoutSvc   │───►│ one write tx  │───►│ *Ops (tx)    │   │   │
//! │  │   │ InventorySvc  │    │ shared `now`  │    │ *Repository  │   │   │
//! │  │   │ CreditSvc ... │    │               │    │ (pool reads) │   │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘   │   │
//! │  │                                                                 │   │
//! │  │   Database (pool.rs)              Migrations (embedded)         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  │   ./data/kiosk.db                                               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Reads and single-statement writes, plus the `*Ops`
//!   statement sets used inside a transaction
//! - [`unit_of_work`] - Typed write transaction
//! - [`service`] - Catalog, inventory, checkout, phones, credit, reports,
//!   monthly report job
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kiosk_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./data/kiosk.db")).await?;
//!
//! let product = db.inventory().receive_stock(&receipt, &user.id).await?;
//! let sale = db.checkout().create_sale(&cart, &user.id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;
pub mod unit_of_work;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use unit_of_work::UnitOfWork;

// Repository re-exports for convenience
pub use repository::outbox::{NotificationKind, OutboxMessage, OutboxRepository};
pub use repository::product::ProductRepository;
pub use repository::sale::SaleRepository;

// Service re-exports
pub use service::catalog::CatalogService;
pub use service::checkout::CheckoutService;
pub use service::credit::CreditService;
pub use service::inventory::InventoryService;
pub use service::monthly_report::MonthlyReportJob;
pub use service::phone::PhoneService;
pub use service::report::ReportService;
