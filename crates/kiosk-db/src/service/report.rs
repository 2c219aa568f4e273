//! # Report Service
//!
//! Read-only aggregation over the sales ledger. Facts are loaded by
//! [`ReportRepository`](crate::repository::report::ReportRepository) and
//! grouped by the pure functions in `kiosk_core::report`; nothing is
//! pre-computed.

use kiosk_core::period::{DateRange, MonthPeriod};
use kiosk_core::report::{
    monthly_report, summarize, summarize_lines, top_products, MonthlyReport, ReportBucket,
    SummaryRow, TopProduct,
};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use crate::repository::report::ReportRepository;

/// Default number of rows in the top-products report.
pub const DEFAULT_TOP_PRODUCTS: usize = 5;

#[derive(Debug, Clone)]
pub struct ReportService {
    data: ReportRepository,
}

impl ReportService {
    pub fn new(pool: SqlitePool) -> Self {
        ReportService {
            data: ReportRepository::new(pool),
        }
    }

    /// Bucketed summary. With a category, only that category's lines count
    /// and the payment split stays zero.
    pub async fn summary(
        &self,
        range: DateRange,
        bucket: ReportBucket,
        category_id: Option<&str>,
    ) -> DbResult<Vec<SummaryRow>> {
        let rows = match category_id {
            Some(category_id) => {
                let lines = self.data.line_facts(range, Some(category_id)).await?;
                summarize_lines(bucket, &lines)
            }
            None => {
                let sales = self.data.sale_facts(range).await?;
                let lines = self.data.line_facts(range, None).await?;
                summarize(bucket, &sales, &lines)
            }
        };
        debug!(?bucket, rows = rows.len(), "Summary built");
        Ok(rows)
    }

    /// Best sellers by revenue.
    pub async fn top_products(
        &self,
        range: DateRange,
        limit: usize,
        category_id: Option<&str>,
    ) -> DbResult<Vec<TopProduct>> {
        let lines = self.data.line_facts(range, category_id).await?;
        Ok(top_products(&lines, limit))
    }

    /// Report for one calendar month.
    pub async fn monthly_report(&self, period: MonthPeriod) -> DbResult<MonthlyReport> {
        let range = DateRange::month(period);
        let sales = self.data.sale_facts(range).await?;
        let lines = self.data.line_facts(range, None).await?;
        Ok(monthly_report(&period.to_string(), &sales, &lines))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::catalog::{CategoryInput, NewProduct};
    use crate::service::checkout::NewSale;
    use crate::service::credit::NewCreditPayment;
    use crate::service::test_support::{admin, credit_sale, db, product, stock};
    use kiosk_core::checkout::SaleLine;
    use kiosk_core::{Money, PaymentMethod, Product};

    fn sale_of(items: &[(&Product, i64, i64)], method: PaymentMethod) -> NewSale {
        NewSale {
            items: items
                .iter()
                .map(|(p, qty, price)| SaleLine {
                    product_id: p.id.clone(),
                    quantity: *qty,
                    unit_price: Money::from_minor(*price),
                })
                .collect(),
            discount: None,
            payment_method: method,
        }
    }

    #[tokio::test]
    async fn test_summary_reconciles_with_sales() {
        let db = db().await;
        let admin = admin(&db).await;
        let cola = product(&db, "Cola", 150, 0).await;
        let chips = product(&db, "Chips", 200, 0).await;
        stock(&db, &admin, &cola, 50, 100).await;
        stock(&db, &admin, &chips, 50, 120).await;

        let checkout = db.checkout();
        checkout
            .create_sale(&sale_of(&[(&cola, 10, 150)], PaymentMethod::Cash), &admin.id)
            .await
            .unwrap();
        checkout
            .create_sale(&sale_of(&[(&cola, 1, 150), (&chips, 2, 200)], PaymentMethod::Card), &admin.id)
            .await
            .unwrap();

        // phone bought at 500, sold at 1000 on credit, 200 down + 100 paid
        let credit = credit_sale(&db, &admin, "999", 1000, 200).await;
        db.credit_ledger()
            .record_payment(
                &NewCreditPayment {
                    sale_id: credit.id.clone(),
                    amount: Money::from_minor(100),
                    note: None,
                },
                &admin.id,
            )
            .await
            .unwrap();

        let rows = db
            .reports()
            .summary(DateRange::default(), ReportBucket::Day, None)
            .await
            .unwrap();

        let revenue: Money = rows.iter().map(|r| r.revenue).sum();
        let count: i64 = rows.iter().map(|r| r.count).sum();
        let profit: Money = rows.iter().map(|r| r.profit).sum();
        let unpaid: Money = rows.iter().map(|r| r.credit_unpaid).sum();

        assert_eq!(revenue.minor(), 1500 + 550 + 1000);
        assert_eq!(count, 3);
        // items: 10×50 + 1×50 + 2×80 = 710; phone: 300 collected - 500 cost
        assert_eq!(profit.minor(), 710 - 200);
        assert_eq!(unpaid.minor(), 700);

        let cash: Money = rows.iter().map(|r| r.cash).sum();
        let card: Money = rows.iter().map(|r| r.card).sum();
        assert_eq!(cash.minor(), 1500);
        assert_eq!(card.minor(), 550);
    }

    #[tokio::test]
    async fn test_category_summary_and_top_products() {
        let db = db().await;
        let admin = admin(&db).await;
        let drinks = db
            .catalog()
            .create_category(&CategoryInput {
                name: "Drinks".into(),
                default_pack_size: None,
            })
            .await
            .unwrap();
        let cola = db
            .catalog()
            .create_product(NewProduct {
                name: "Cola".into(),
                category_id: Some(drinks.id.clone()),
                price: Some(Money::from_minor(150)),
                ..Default::default()
            })
            .await
            .unwrap();
        let chips = product(&db, "Chips", 200, 0).await;
        stock(&db, &admin, &cola, 20, 100).await;
        stock(&db, &admin, &chips, 20, 120).await;

        db.checkout()
            .create_sale(&sale_of(&[(&cola, 2, 150), (&chips, 3, 200)], PaymentMethod::Cash), &admin.id)
            .await
            .unwrap();

        let rows = db
            .reports()
            .summary(DateRange::default(), ReportBucket::Month, Some(&drinks.id))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].revenue.minor(), 300);
        assert_eq!(rows[0].profit.minor(), 100);
        assert_eq!(rows[0].count, 1);
        assert_eq!(rows[0].cash, Money::zero());

        let top = db
            .reports()
            .top_products(DateRange::default(), DEFAULT_TOP_PRODUCTS, None)
            .await
            .unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].name, "Chips");
        assert_eq!(top[0].qty, 3);
        assert_eq!(top[1].revenue.minor(), 300);
    }
}
