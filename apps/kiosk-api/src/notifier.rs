//! # Notification Delivery
//!
//! Drains the `notification_outbox` table written by the services.
//!
//! ## Worker Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  every NOTIFY_POLL_SECS                                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  outbox.pending(BATCH_SIZE, MAX_ATTEMPTS)   oldest first                │
//! │       │                                                                 │
//! │       ▼ for each message                                                │
//! │  notifier.send(body)                                                    │
//! │       ├── Ok  ──► mark_delivered                                        │
//! │       └── Err ──► mark_failed (attempts += 1, last_error)               │
//! │                   retried next tick until MAX_ATTEMPTS                  │
//! │                                                                         │
//! │  every PRUNE_INTERVAL                                                   │
//! │       └── outbox.prune_delivered(now - RETENTION_DAYS)                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Delivery runs after the originating transaction committed, so a slow or
//! failing chat never affects a sale.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kiosk_core::message::{chunk_message, MAX_MESSAGE_CHARS};
use kiosk_db::{Database, DbResult, OutboxRepository};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;

// =============================================================================
// Constants
// =============================================================================

/// Attempts before a message is left undelivered for good.
pub const MAX_ATTEMPTS: u32 = 10;

/// Messages handled per tick.
const BATCH_SIZE: u32 = 50;

/// Delivered messages are kept this long, then deleted.
pub const RETENTION_DAYS: i64 = 30;

/// How often delivered messages are pruned.
const PRUNE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Timeout for one Bot API call.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Notifiers
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Outbound channel for shop notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), NotifyError>;
}

/// Sends through the Telegram Bot API (`sendMessage`, HTML parse mode).
pub struct TelegramNotifier {
    client: reqwest::Client,
    url: String,
    chat_id: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

impl TelegramNotifier {
    pub fn new(api_base: &str, bot_token: &str, chat_id: &str) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(TelegramNotifier {
            client,
            url: format!(
                "{}/bot{}/sendMessage",
                api_base.trim_end_matches('/'),
                bot_token
            ),
            chat_id: chat_id.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    /// Long texts go out as several messages split on line boundaries.
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        for chunk in chunk_message(text, MAX_MESSAGE_CHARS) {
            let response = self
                .client
                .post(&self.url)
                .json(&SendMessage {
                    chat_id: &self.chat_id,
                    text: &chunk,
                    parse_mode: "HTML",
                    disable_web_page_preview: true,
                })
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(NotifyError::Rejected {
                    status: status.as_u16(),
                    body,
                });
            }
        }
        Ok(())
    }
}

/// Writes notifications to the log. Used when Telegram is not configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        info!(text = %text, "Notification");
        Ok(())
    }
}

/// Telegram when both token and chat id are set, the log otherwise.
pub fn notifier_from_config(config: &AppConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    match config.telegram() {
        Some((token, chat_id)) => {
            info!("Telegram notifications enabled");
            Ok(Arc::new(TelegramNotifier::new(
                &config.telegram_api_base,
                token,
                chat_id,
            )?))
        }
        None => {
            info!("Telegram not configured, notifications are logged only");
            Ok(Arc::new(LogNotifier))
        }
    }
}

// =============================================================================
// Worker
// =============================================================================

/// Polls the outbox and hands messages to a [`Notifier`].
pub struct NotificationWorker {
    outbox: OutboxRepository,
    notifier: Arc<dyn Notifier>,
    poll: Duration,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Stops a running [`NotificationWorker`].
#[derive(Clone)]
pub struct NotificationWorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl NotificationWorkerHandle {
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

impl NotificationWorker {
    pub fn new(
        db: &Database,
        notifier: Arc<dyn Notifier>,
        poll: Duration,
    ) -> (Self, NotificationWorkerHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let worker = NotificationWorker {
            outbox: db.outbox(),
            notifier,
            poll,
            shutdown_rx,
        };
        (worker, NotificationWorkerHandle { shutdown_tx })
    }

    /// Runs until shut down. Spawn as a background task.
    pub async fn run(mut self) {
        info!(poll_secs = self.poll.as_secs(), "Notification worker starting");

        let mut interval = tokio::time::interval(self.poll);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut prune = tokio::time::interval(PRUNE_INTERVAL);
        prune.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.deliver_pending().await {
                        error!(error = %e, "Failed to process notification outbox");
                    }
                }

                _ = prune.tick() => {
                    if let Err(e) = self.prune_delivered(Utc::now()).await {
                        error!(error = %e, "Failed to prune notification outbox");
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Notification worker shutting down");
                    break;
                }
            }
        }

        info!("Notification worker stopped");
    }

    /// One pass over the pending messages. Returns how many were delivered.
    pub async fn deliver_pending(&self) -> DbResult<usize> {
        let messages = self.outbox.pending(BATCH_SIZE, MAX_ATTEMPTS).await?;
        if messages.is_empty() {
            return Ok(0);
        }

        debug!(count = messages.len(), "Delivering notifications");
        let mut delivered = 0;

        for message in messages {
            match self.notifier.send(&message.body).await {
                Ok(()) => {
                    self.outbox.mark_delivered(&message.id).await?;
                    delivered += 1;
                }
                Err(e) => {
                    self.outbox.mark_failed(&message.id, &e.to_string()).await?;
                    if message.attempts + 1 >= MAX_ATTEMPTS as i64 {
                        warn!(
                            notification_id = %message.id,
                            kind = %message.kind,
                            "Giving up on notification after max attempts"
                        );
                    }
                }
            }
        }

        Ok(delivered)
    }

    /// Deletes messages delivered more than [`RETENTION_DAYS`] before `now`.
    pub async fn prune_delivered(&self, now: DateTime<Utc>) -> DbResult<u64> {
        let cutoff = now - chrono::Duration::days(RETENTION_DAYS);
        let removed = self.outbox.prune_delivered(cutoff).await?;
        if removed > 0 {
            info!(removed, retention_days = RETENTION_DAYS, "Old notifications pruned");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiosk_db::{DbConfig, NotificationKind};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for Recording {
        async fn send(&self, text: &str) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct Down;

    #[async_trait]
    impl Notifier for Down {
        async fn send(&self, _text: &str) -> Result<(), NotifyError> {
            Err(NotifyError::Rejected {
                status: 502,
                body: "bad gateway".into(),
            })
        }
    }

    async fn db_with_messages(bodies: &[&str]) -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut uow = db.begin().await.unwrap();
        for body in bodies {
            uow.outbox()
                .enqueue(NotificationKind::Sale, body, Utc::now())
                .await
                .unwrap();
        }
        uow.commit().await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_delivers_in_order_and_marks_delivered() {
        let db = db_with_messages(&["first", "second"]).await;
        let notifier = Arc::new(Recording::default());
        let (worker, _handle) =
            NotificationWorker::new(&db, notifier.clone(), Duration::from_secs(1));

        assert_eq!(worker.deliver_pending().await.unwrap(), 2);
        assert_eq!(*notifier.sent.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(db.outbox().count_pending(MAX_ATTEMPTS).await.unwrap(), 0);

        // Nothing is sent twice.
        assert_eq!(worker.deliver_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failures_are_recorded_and_retried() {
        let db = db_with_messages(&["sale"]).await;
        let (worker, _handle) = NotificationWorker::new(&db, Arc::new(Down), Duration::from_secs(1));

        assert_eq!(worker.deliver_pending().await.unwrap(), 0);
        let pending = db.outbox().pending(10, MAX_ATTEMPTS).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempts, 1);
        assert!(pending[0].last_error.as_deref().unwrap().contains("502"));

        for _ in 1..MAX_ATTEMPTS {
            worker.deliver_pending().await.unwrap();
        }
        assert_eq!(db.outbox().count_pending(MAX_ATTEMPTS).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delivered_messages_are_pruned_after_retention() {
        let db = db_with_messages(&["old"]).await;
        let (worker, _handle) =
            NotificationWorker::new(&db, Arc::new(Recording::default()), Duration::from_secs(1));
        assert_eq!(worker.deliver_pending().await.unwrap(), 1);

        let undelivered = db_with_messages(&["stuck"]).await;
        let (stuck_worker, _handle) =
            NotificationWorker::new(&undelivered, Arc::new(Down), Duration::from_secs(1));
        stuck_worker.deliver_pending().await.unwrap();

        // Within retention nothing goes.
        assert_eq!(worker.prune_delivered(Utc::now()).await.unwrap(), 0);
        assert_eq!(db.outbox().by_kind(NotificationKind::Sale).await.unwrap().len(), 1);

        let later = Utc::now() + chrono::Duration::days(RETENTION_DAYS + 1);
        assert_eq!(worker.prune_delivered(later).await.unwrap(), 1);
        assert!(db.outbox().by_kind(NotificationKind::Sale).await.unwrap().is_empty());

        // Failed messages are never pruned.
        assert_eq!(stuck_worker.prune_delivered(later).await.unwrap(), 0);
        assert_eq!(undelivered.outbox().count_pending(MAX_ATTEMPTS).await.unwrap(), 1);
    }
}
