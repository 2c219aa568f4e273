//! # Monthly Report Job
//!
//! Publishes the previous month's report once per month.
//!
//! ```text
//! tick(now) ── due_period(now)? ── no ──► nothing
//!                  │ yes (e.g. "2024-04")
//!                  ▼
//!          job_runs has ("monthly_report", "2024-04")? ── yes ──► nothing
//!                  │ no
//!                  ▼
//!          UnitOfWork: INSERT OR IGNORE job_runs  ── lost the race ──► rollback
//!                      load facts, build message
//!                      enqueue MONTHLY_REPORT
//!                  commit
//! ```
//!
//! The claim and the outbox row commit together, so a claimed period
//! always has its message queued, and the outbox worker retries delivery.

use chrono::{DateTime, Utc};
use kiosk_core::message::monthly_report_message;
use kiosk_core::period::{DateRange, MonthlySchedule};
use kiosk_core::report::monthly_report;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;
use crate::repository::job::JobRunRepository;
use crate::repository::outbox::NotificationKind;
use crate::unit_of_work::UnitOfWork;

/// `job_runs.job_name` of this job.
pub const JOB_NAME: &str = "monthly_report";

#[derive(Debug, Clone)]
pub struct MonthlyReportJob {
    pool: SqlitePool,
}

impl MonthlyReportJob {
    pub fn new(pool: SqlitePool) -> Self {
        MonthlyReportJob { pool }
    }

    /// Runs the job if a period is due and unclaimed.
    ///
    /// Returns the period it reported on, or `None` when there was nothing
    /// to do.
    pub async fn run_if_due(
        &self,
        now: DateTime<Utc>,
        schedule: &MonthlySchedule,
    ) -> DbResult<Option<String>> {
        let Some(period) = schedule.due_period(now) else {
            return Ok(None);
        };
        let label = period.to_string();

        if JobRunRepository::new(self.pool.clone())
            .has_run(JOB_NAME, &label)
            .await?
        {
            return Ok(None);
        }

        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let at = uow.now();

        if !uow.jobs().claim(JOB_NAME, &label, at).await? {
            debug!(period = %label, "Monthly report already claimed");
            uow.rollback().await?;
            return Ok(None);
        }

        let range = DateRange::month(period);
        let sales = uow.reports().sale_facts(range).await?;
        let lines = uow.reports().line_facts(range).await?;
        let report = monthly_report(&label, &sales, &lines);
        let text = monthly_report_message(&report);
        uow.outbox()
            .enqueue(NotificationKind::MonthlyReport, &text, at)
            .await?;

        uow.commit().await?;

        info!(
            period = %label,
            sales = report.sales_count,
            revenue = %report.total_revenue,
            "Monthly report queued"
        );
        Ok(Some(label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::checkout::NewSale;
    use crate::service::test_support::{admin, db, product, stock};
    use chrono::Duration;
    use kiosk_core::checkout::SaleLine;
    use kiosk_core::period::MonthPeriod;
    use kiosk_core::{Money, PaymentMethod};

    #[tokio::test]
    async fn test_report_is_claimed_once_per_period() {
        let db = db().await;
        let admin = admin(&db).await;
        let cola = product(&db, "Cola", 150, 0).await;
        stock(&db, &admin, &cola, 10, 100).await;
        db.checkout()
            .create_sale(
                &NewSale {
                    items: vec![SaleLine {
                        product_id: cola.id.clone(),
                        quantity: 4,
                        unit_price: Money::from_minor(150),
                    }],
                    discount: None,
                    payment_method: PaymentMethod::Cash,
                },
                &admin.id,
            )
            .await
            .unwrap();

        let this_month = MonthPeriod::containing(Utc::now());
        let next_month_start = this_month.next().start();
        let schedule = MonthlySchedule::new(9);
        let job = db.monthly_report_job();

        // not due before the report hour
        let early = next_month_start + Duration::hours(8);
        assert_eq!(job.run_if_due(early, &schedule).await.unwrap(), None);

        let due = next_month_start + Duration::hours(10);
        assert_eq!(
            job.run_if_due(due, &schedule).await.unwrap(),
            Some(this_month.to_string())
        );
        assert_eq!(job.run_if_due(due + Duration::minutes(1), &schedule).await.unwrap(), None);

        let queued = db.outbox().by_kind(NotificationKind::MonthlyReport).await.unwrap();
        assert_eq!(queued.len(), 1);
        assert!(queued[0].body.contains(&this_month.to_string()));
        assert!(queued[0].body.contains("Cola"));

        let run = db.job_runs().latest(JOB_NAME).await.unwrap().unwrap();
        assert_eq!(run.period, this_month.to_string());
    }
}
