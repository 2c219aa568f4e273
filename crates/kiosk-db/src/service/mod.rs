//! # Services
//!
//! Every multi-row write of the shop runs here, each inside one
//! [`UnitOfWork`](crate::UnitOfWork).
//!
//! ## Service Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. validate input              (kiosk-core, no I/O)                     │
//! │  2. UnitOfWork::begin           (write lock)                            │
//! │  3. authoritative re-read       (stock, phone status, credit balance)   │
//! │  4. decide                      (kiosk-core: plan_checkout, credit ...) │
//! │  5. guarded writes              (UPDATE ... WHERE stock >= ?)           │
//! │  6. enqueue notification        (same transaction)                      │
//! │  7. commit                                                              │
//! │                                                                         │
//! │  Any error in 2-7 drops the unit of work: nothing is written.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Services never read through the pool while holding a unit of work; the
//! in-memory test database has a single connection.

pub mod catalog;
pub mod checkout;
pub mod credit;
pub mod inventory;
pub mod monthly_report;
pub mod phone;
pub mod report;

#[cfg(test)]
pub(crate) mod test_support;
