//! # Repository Module
//!
//! Database repository implementations for Kiosk POS.
//!
//! ## Two Halves per Module
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  HTTP handler (read)                 Service (write)                    │
//! │       │                                   │                             │
//! │       │ db.products().list(..)            │ uow.products().decrement(..)│
//! │       ▼                                   ▼                             │
//! │  ProductRepository                   ProductOps<'a>                     │
//! │  (owns a SqlitePool clone)           (borrows the UnitOfWork's          │
//! │                                       transaction connection)           │
//! │       │                                   │                             │
//! │       └────────────┬──────────────────────┘                             │
//! │                    ▼                                                    │
//! │        shared query fns, generic over sqlx::Executor                    │
//! │                    │                                                    │
//! │                    ▼                                                    │
//! │               SQLite Database                                           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`user::UserRepository`] - Accounts and login lookup
//! - [`category::CategoryRepository`] - Categories
//! - [`product::ProductRepository`] - Product CRUD, search and stock updates
//! - [`movement::MovementRepository`] - Inventory ledger
//! - [`sale::SaleRepository`] - Sales, sale items, exports
//! - [`phone::PhoneRepository`] - Phones and their movements
//! - [`credit::CreditRepository`] - Credit sales and payments
//! - [`report::ReportRepository`] - Sale and line facts for reports
//! - [`outbox::OutboxRepository`] - Notification queue
//! - [`job::JobRunRepository`] - Scheduled job claims

use uuid::Uuid;

pub mod category;
pub mod credit;
pub mod job;
pub mod movement;
pub mod outbox;
pub mod phone;
pub mod product;
pub mod report;
pub mod sale;
pub mod user;

/// New primary key.
pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}
