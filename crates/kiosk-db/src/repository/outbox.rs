//! # Notification Outbox Repository
//!
//! Queue of chat notifications waiting to be delivered.
//!
//! ## Outbox Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Notification Outbox Flow                             │
//! │                                                                         │
//! │  1. Sale / stock change / monthly job                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  2. BEGIN → business rows + notification_outbox row → COMMIT            │
//! │       │     (rolled back together: no message for a failed sale)        │
//! │       ▼                                                                 │
//! │  3. NotificationWorker (kiosk-api, background task)                     │
//! │       ├── pending(): delivered_at IS NULL AND attempts < max            │
//! │       ├── send via Notifier                                             │
//! │       ├── OK?  → mark_delivered()                                       │
//! │       └── ERR? → mark_failed() (attempts += 1, last_error)              │
//! │                                                                         │
//! │  4. prune_delivered(): delivered rows past retention are deleted        │
//! │                                                                         │
//! │  The HTTP response never waits for step 3.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use super::new_id;
use crate::error::{DbError, DbResult};

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum NotificationKind {
    StockIn,
    StockOut,
    Sale,
    PhoneSale,
    MonthlyReport,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::StockIn => "stock_in",
            NotificationKind::StockOut => "stock_out",
            NotificationKind::Sale => "sale",
            NotificationKind::PhoneSale => "phone_sale",
            NotificationKind::MonthlyReport => "monthly_report",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queued notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OutboxMessage {
    pub id: String,
    pub kind: NotificationKind,
    pub body: String,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

const OUTBOX_COLUMNS: &str = "id, kind, body, attempts, last_error, created_at, delivered_at";

/// Repository for the delivery side of the outbox.
#[derive(Debug, Clone)]
pub struct OutboxRepository {
    pool: SqlitePool,
}

impl OutboxRepository {
    /// Creates a new OutboxRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OutboxRepository { pool }
    }

    /// Undelivered messages with attempts left, oldest first.
    pub async fn pending(&self, limit: u32, max_attempts: u32) -> DbResult<Vec<OutboxMessage>> {
        let sql = format!(
            "SELECT {OUTBOX_COLUMNS} FROM notification_outbox \
             WHERE delivered_at IS NULL AND attempts < ?1 \
             ORDER BY created_at, id LIMIT ?2"
        );
        let messages = sqlx::query_as::<_, OutboxMessage>(&sql)
            .bind(max_attempts as i64)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = messages.len(), "Pending notifications loaded");
        Ok(messages)
    }

    /// Marks a message as delivered.
    pub async fn mark_delivered(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE notification_outbox SET delivered_at = ?2, attempts = attempts + 1 WHERE id = ?1",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Notification", id));
        }
        debug!(notification_id = %id, "Notification delivered");
        Ok(())
    }

    /// Records a failed delivery attempt.
    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE notification_outbox SET attempts = attempts + 1, last_error = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Notification", id));
        }
        warn!(notification_id = %id, error = %error, "Notification delivery failed");
        Ok(())
    }

    /// Number of messages still to deliver.
    pub async fn count_pending(&self, max_attempts: u32) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notification_outbox WHERE delivered_at IS NULL AND attempts < ?1",
        )
        .bind(max_attempts as i64)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Deletes delivered messages whose `delivered_at` is before `cutoff`.
    /// Undelivered messages are kept whatever their age.
    pub async fn prune_delivered(&self, cutoff: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            "DELETE FROM notification_outbox WHERE delivered_at IS NOT NULL AND delivered_at < ?1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        let removed = result.rows_affected();
        if removed > 0 {
            debug!(removed, cutoff = %cutoff, "Delivered notifications pruned");
        }
        Ok(removed)
    }

    /// Every message of a kind, oldest first.
    pub async fn by_kind(&self, kind: NotificationKind) -> DbResult<Vec<OutboxMessage>> {
        let sql = format!(
            "SELECT {OUTBOX_COLUMNS} FROM notification_outbox WHERE kind = ?1 ORDER BY created_at, id"
        );
        let messages = sqlx::query_as::<_, OutboxMessage>(&sql)
            .bind(kind)
            .fetch_all(&self.pool)
            .await?;
        Ok(messages)
    }
}

/// Enqueueing inside a [`UnitOfWork`](crate::UnitOfWork).
pub struct OutboxOps<'a> {
    conn: &'a mut SqliteConnection,
}

impl<'a> OutboxOps<'a> {
    pub(crate) fn new(conn: &'a mut SqliteConnection) -> Self {
        OutboxOps { conn }
    }

    /// Queues a message; it becomes visible to the worker on commit.
    pub async fn enqueue(&mut self, kind: NotificationKind, body: &str, at: DateTime<Utc>) -> DbResult<String> {
        let id = new_id();
        sqlx::query(
            "INSERT INTO notification_outbox (id, kind, body, attempts, created_at) VALUES (?1, ?2, ?3, 0, ?4)",
        )
        .bind(&id)
        .bind(kind)
        .bind(body)
        .bind(at)
        .execute(&mut *self.conn)
        .await?;

        debug!(notification_id = %id, kind = %kind, "Notification enqueued");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::Duration;

    async fn enqueue(db: &Database, body: &str) -> String {
        let mut uow = db.begin().await.unwrap();
        let id = uow
            .outbox()
            .enqueue(NotificationKind::StockIn, body, Utc::now())
            .await
            .unwrap();
        uow.commit().await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_prune_removes_only_old_delivered_rows() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let outbox = db.outbox();
        let delivered = enqueue(&db, "delivered").await;
        let waiting = enqueue(&db, "waiting").await;
        outbox.mark_delivered(&delivered).await.unwrap();

        // Delivered just now: younger than the cutoff.
        let removed = outbox
            .prune_delivered(Utc::now() - Duration::days(1))
            .await
            .unwrap();
        assert_eq!(removed, 0);

        let removed = outbox
            .prune_delivered(Utc::now() + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let left = outbox.by_kind(NotificationKind::StockIn).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, waiting);
        assert!(left[0].delivered_at.is_none());
    }
}
