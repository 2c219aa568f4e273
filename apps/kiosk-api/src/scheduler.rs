//! Monthly report scheduler.
//!
//! Ticks on an interval and asks [`MonthlyReportJob`] whether last month's
//! report is due. The `job_runs` claim makes the job run at most once per
//! period, across restarts and across several ticks in the due window; the
//! report itself goes through the outbox, so delivery is retried.

use std::time::Duration;

use chrono::Utc;
use kiosk_core::period::MonthlySchedule;
use kiosk_db::{Database, MonthlyReportJob};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

pub struct ReportScheduler {
    job: MonthlyReportJob,
    schedule: MonthlySchedule,
    tick: Duration,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Stops a running [`ReportScheduler`].
#[derive(Clone)]
pub struct ReportSchedulerHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl ReportSchedulerHandle {
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

impl ReportScheduler {
    pub fn new(db: &Database, report_hour_utc: u32, tick: Duration) -> (Self, ReportSchedulerHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let scheduler = ReportScheduler {
            job: db.monthly_report_job(),
            schedule: MonthlySchedule::new(report_hour_utc),
            tick,
            shutdown_rx,
        };
        (scheduler, ReportSchedulerHandle { shutdown_tx })
    }

    /// Runs until shut down. The first check happens immediately, so a
    /// report missed while the process was down goes out on startup.
    pub async fn run(mut self) {
        info!(tick_secs = self.tick.as_secs(), "Report scheduler starting");

        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => self.check().await,

                _ = self.shutdown_rx.recv() => {
                    info!("Report scheduler shutting down");
                    break;
                }
            }
        }

        info!("Report scheduler stopped");
    }

    async fn check(&self) {
        match self.job.run_if_due(Utc::now(), &self.schedule).await {
            Ok(Some(period)) => info!(period = %period, "Monthly report queued for delivery"),
            Ok(None) => debug!("No monthly report due"),
            Err(e) => error!(error = %e, "Monthly report job failed"),
        }
    }
}
