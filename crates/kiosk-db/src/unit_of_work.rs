//! # Unit of Work
//!
//! A typed wrapper around one SQLite write transaction.
//!
//! ## Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  let mut uow = UnitOfWork::begin(&pool).await?;   ← write lock taken    │
//! │                                                                         │
//! │  uow.products().decrement(..)  ─┐                                       │
//! │  uow.sales().insert_sale(..)    ├─ each call borrows the transaction    │
//! │  uow.movements().record(..)     │  for its own duration only            │
//! │  uow.outbox().enqueue(..)      ─┘                                       │
//! │                                                                         │
//! │  uow.commit().await?;          ← all rows visible at once               │
//! │  (any `?` before this point drops the uow → ROLLBACK)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each accessor hands out an `*Ops` value holding `&mut SqliteConnection`,
//! so services only reach the statements they need, and the borrow checker
//! keeps two ops from interleaving on the same transaction.
//!
//! ## Locking
//! SQLite starts a deferred transaction on `BEGIN`. Two transactions that
//! both read stock and then both try to write would deadlock into
//! `SQLITE_BUSY`. `begin` therefore issues a write as its first statement so
//! the write lock is taken up front; a second writer waits on the busy
//! timeout and then sees the first writer's committed rows.

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::category::CategoryOps;
use crate::repository::credit::CreditOps;
use crate::repository::job::JobOps;
use crate::repository::movement::MovementOps;
use crate::repository::outbox::OutboxOps;
use crate::repository::phone::PhoneOps;
use crate::repository::product::ProductOps;
use crate::repository::report::ReportOps;
use crate::repository::sale::SaleOps;
use crate::repository::user::UserOps;

/// One write transaction plus the timestamp every row in it shares.
pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
    now: DateTime<Utc>,
}

impl UnitOfWork {
    /// Begins a transaction and takes the database write lock.
    pub async fn begin(pool: &SqlitePool) -> DbResult<Self> {
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        // Matches no rows; only there to take the write lock.
        sqlx::query("UPDATE job_runs SET ran_at = ran_at WHERE 0")
            .execute(&mut *tx)
            .await?;

        debug!("Write transaction started");
        Ok(UnitOfWork { tx, now: Utc::now() })
    }

    /// Timestamp for every row written in this transaction.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn users(&mut self) -> UserOps<'_> {
        UserOps::new(&mut self.tx)
    }

    pub fn categories(&mut self) -> CategoryOps<'_> {
        CategoryOps::new(&mut self.tx)
    }

    pub fn products(&mut self) -> ProductOps<'_> {
        ProductOps::new(&mut self.tx)
    }

    pub fn movements(&mut self) -> MovementOps<'_> {
        MovementOps::new(&mut self.tx)
    }

    pub fn sales(&mut self) -> SaleOps<'_> {
        SaleOps::new(&mut self.tx)
    }

    pub fn phones(&mut self) -> PhoneOps<'_> {
        PhoneOps::new(&mut self.tx)
    }

    pub fn credits(&mut self) -> CreditOps<'_> {
        CreditOps::new(&mut self.tx)
    }

    pub fn reports(&mut self) -> ReportOps<'_> {
        ReportOps::new(&mut self.tx)
    }

    pub fn outbox(&mut self) -> OutboxOps<'_> {
        OutboxOps::new(&mut self.tx)
    }

    pub fn jobs(&mut self) -> JobOps<'_> {
        JobOps::new(&mut self.tx)
    }

    /// Commits every write made through this unit of work.
    pub async fn commit(self) -> DbResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        debug!("Write transaction committed");
        Ok(())
    }

    /// Rolls back explicitly. Dropping the unit of work has the same effect.
    pub async fn rollback(self) -> DbResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))
    }
}
