//! # Reporting Aggregation
//!
//! Period-bucketed summaries, top products and the monthly report, computed
//! by a full scan over sale facts read from the database.
//!
//! ## Data Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  kiosk-db                               kiosk-core (THIS MODULE)        │
//! │  ─────────                              ─────────────────────────       │
//! │  sales in range   ──► Vec<SaleFact> ──┐                                 │
//! │                                       ├──► summarize()  ──► SummaryRow  │
//! │  sale items       ──► Vec<LineFact> ──┤    summarize_lines() (category) │
//! │  (+ product name,                     ├──► top_products()               │
//! │     category)                         └──► monthly_report()             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Profit Rule
//! Profit of a sale is `Σ (unit_price - unit_cost) × quantity` over its
//! items plus its phone profit. A credit phone sale only counts what has
//! been collected (`total_paid - purchase_price`), see
//! [`crate::credit::phone_sale_profit`]. The discount is reflected in
//! revenue (`Sale.total`) and not in item profit.
//!
//! ## Week Buckets
//! Week keys are an approximation, not ISO-8601 week numbers:
//! `ceil((days since Jan 1 + weekday of Jan 1 (Sunday = 0) + 1) / 7)`,
//! rendered as `YYYY-W{n}`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::credit::phone_sale_profit;
use crate::error::ValidationError;
use crate::money::Money;
use crate::types::PaymentMethod;

// =============================================================================
// Buckets
// =============================================================================

/// Time-period grouping for summaries.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ReportBucket {
    #[default]
    Day,
    Week,
    Month,
    Year,
}

impl FromStr for ReportBucket {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(ReportBucket::Day),
            "week" => Ok(ReportBucket::Week),
            "month" => Ok(ReportBucket::Month),
            "year" => Ok(ReportBucket::Year),
            _ => Err(ValidationError::NotAllowed {
                field: "bucket".to_string(),
                allowed: ["day", "week", "month", "year"].map(String::from).to_vec(),
            }),
        }
    }
}

/// Sortable bucket identity. Orders chronologically, unlike the label
/// (`2024-W10` sorts before `2024-W9` as text).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketKey {
    bucket: ReportBucket,
    year: i32,
    index: u32,
}

impl BucketKey {
    pub fn of(bucket: ReportBucket, at: DateTime<Utc>) -> Self {
        let date = at.date_naive();
        let index = match bucket {
            ReportBucket::Day => date.ordinal(),
            ReportBucket::Week => approx_week_number(at),
            ReportBucket::Month => date.month(),
            ReportBucket::Year => 0,
        };
        BucketKey {
            bucket,
            year: date.year(),
            index,
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bucket {
            ReportBucket::Day => match NaiveDate::from_yo_opt(self.year, self.index) {
                Some(date) => write!(f, "{}", date.format("%Y-%m-%d")),
                None => write!(f, "{}-{:03}", self.year, self.index),
            },
            ReportBucket::Week => write!(f, "{}-W{}", self.year, self.index),
            ReportBucket::Month => write!(f, "{}-{:02}", self.year, self.index),
            ReportBucket::Year => write!(f, "{}", self.year),
        }
    }
}

/// Returns the bucket label for a timestamp.
///
/// ## Example
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use kiosk_core::report::{bucket_key, ReportBucket};
///
/// let at = Utc.with_ymd_and_hms(2024, 3, 5, 14, 0, 0).unwrap();
/// assert_eq!(bucket_key(ReportBucket::Day, at), "2024-03-05");
/// assert_eq!(bucket_key(ReportBucket::Month, at), "2024-03");
/// assert_eq!(bucket_key(ReportBucket::Year, at), "2024");
/// ```
pub fn bucket_key(bucket: ReportBucket, at: DateTime<Utc>) -> String {
    BucketKey::of(bucket, at).to_string()
}

fn approx_week_number(at: DateTime<Utc>) -> u32 {
    const DAY: i64 = 86_400;
    let Some(first_jan) = NaiveDate::from_ymd_opt(at.year(), 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
    else {
        return 1;
    };
    let since = (at - first_jan).num_seconds();
    let offset = first_jan.weekday().num_days_from_sunday() as i64 + 1;
    let numerator = since + offset * DAY;
    // integer ceil of numerator / 7 days
    ((numerator + 7 * DAY - 1) / (7 * DAY)) as u32
}

// =============================================================================
// Facts
// =============================================================================

/// Phone part of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhoneFact {
    pub sale_price: Money,
    pub purchase_price: Money,
}

/// One sale, as needed by the aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleFact {
    pub sale_id: String,
    pub created_at: DateTime<Utc>,
    pub total: Money,
    pub payment_method: PaymentMethod,
    /// `initial_payment + Σ payments` for credit sales, `total` otherwise.
    pub total_paid: Money,
    pub phone: Option<PhoneFact>,
}

impl SaleFact {
    /// Phone profit under the collected-cash rule, zero for goods sales.
    pub fn phone_profit(&self) -> Money {
        self.phone
            .map(|p| {
                phone_sale_profit(self.payment_method, p.sale_price, p.purchase_price, self.total_paid)
            })
            .unwrap_or_default()
    }

    /// Outstanding balance of a credit sale, zero otherwise.
    pub fn credit_unpaid(&self) -> Money {
        match self.payment_method {
            PaymentMethod::Credit => (self.total - self.total_paid).clamp_non_negative(),
            _ => Money::zero(),
        }
    }
}

/// One sale item joined with its product and sale date.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LineFact {
    pub sale_id: String,
    pub created_at: DateTime<Utc>,
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub unit_cost: Money,
}

impl LineFact {
    pub fn revenue(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }

    pub fn cost(&self) -> Money {
        self.unit_cost.multiply_quantity(self.quantity)
    }

    pub fn profit(&self) -> Money {
        self.revenue() - self.cost()
    }
}

// =============================================================================
// Summary
// =============================================================================

/// One bucket of `GET /reports/summary`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SummaryRow {
    pub period: String,
    pub revenue: Money,
    pub count: i64,
    pub avg: Money,
    pub cash: Money,
    pub card: Money,
    pub credit: Money,
    pub profit: Money,
    pub credit_unpaid: Money,
}

#[derive(Default)]
struct Accumulator {
    revenue: Money,
    sales: HashSet<String>,
    cash: Money,
    card: Money,
    credit: Money,
    profit: Money,
    credit_unpaid: Money,
}

impl Accumulator {
    fn into_row(self, key: BucketKey) -> SummaryRow {
        let count = self.sales.len() as i64;
        SummaryRow {
            period: key.to_string(),
            revenue: self.revenue,
            count,
            avg: self.revenue.divide_rounded(count).unwrap_or_default(),
            cash: self.cash,
            card: self.card,
            credit: self.credit,
            profit: self.profit,
            credit_unpaid: self.credit_unpaid,
        }
    }
}

/// Summarizes sales per bucket, oldest bucket first.
///
/// `lines` are the items of those sales; lines of sales not in `sales` are
/// ignored.
pub fn summarize(bucket: ReportBucket, sales: &[SaleFact], lines: &[LineFact]) -> Vec<SummaryRow> {
    let mut item_profit: HashMap<&str, Money> = HashMap::new();
    for line in lines {
        *item_profit.entry(line.sale_id.as_str()).or_default() += line.profit();
    }

    let mut buckets: BTreeMap<BucketKey, Accumulator> = BTreeMap::new();
    for sale in sales {
        let acc = buckets
            .entry(BucketKey::of(bucket, sale.created_at))
            .or_default();
        acc.revenue += sale.total;
        acc.sales.insert(sale.sale_id.clone());
        match sale.payment_method {
            PaymentMethod::Cash => acc.cash += sale.total,
            PaymentMethod::Card => acc.card += sale.total,
            PaymentMethod::Credit => acc.credit += sale.total,
        }
        acc.profit += item_profit
            .get(sale.sale_id.as_str())
            .copied()
            .unwrap_or_default()
            + sale.phone_profit();
        acc.credit_unpaid += sale.credit_unpaid();
    }

    buckets
        .into_iter()
        .map(|(key, acc)| acc.into_row(key))
        .collect()
}

/// Summarizes the lines of one category per bucket.
///
/// Revenue and profit come from the lines; count is the number of distinct
/// sales; payment split columns stay zero.
pub fn summarize_lines(bucket: ReportBucket, lines: &[LineFact]) -> Vec<SummaryRow> {
    let mut buckets: BTreeMap<BucketKey, Accumulator> = BTreeMap::new();
    for line in lines {
        let acc = buckets
            .entry(BucketKey::of(bucket, line.created_at))
            .or_default();
        acc.revenue += line.revenue();
        acc.profit += line.profit();
        acc.sales.insert(line.sale_id.clone());
    }

    buckets
        .into_iter()
        .map(|(key, acc)| acc.into_row(key))
        .collect()
}

// =============================================================================
// Top Products
// =============================================================================

/// One row of `GET /reports/top-products`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TopProduct {
    pub product_id: String,
    pub name: String,
    pub qty: i64,
    pub revenue: Money,
}

/// Groups lines by product, sorts by revenue descending and keeps `limit`.
pub fn top_products(lines: &[LineFact], limit: usize) -> Vec<TopProduct> {
    let mut by_product: HashMap<&str, TopProduct> = HashMap::new();
    for line in lines {
        let entry = by_product
            .entry(line.product_id.as_str())
            .or_insert_with(|| TopProduct {
                product_id: line.product_id.clone(),
                name: line.product_name.clone(),
                qty: 0,
                revenue: Money::zero(),
            });
        entry.qty += line.quantity;
        entry.revenue += line.revenue();
    }

    let mut list: Vec<TopProduct> = by_product.into_values().collect();
    list.sort_by(|a, b| b.revenue.cmp(&a.revenue).then_with(|| a.name.cmp(&b.name)));
    list.truncate(limit);
    list
}

// =============================================================================
// Monthly Report
// =============================================================================

/// Per-product block of the monthly report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductStat {
    pub name: String,
    pub quantity: i64,
    pub revenue: Money,
    pub cost: Money,
    pub profit: Money,
}

/// Aggregate report for one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyReport {
    /// `YYYY-MM`.
    pub period: String,
    pub sales_count: i64,
    pub total_revenue: Money,
    pub total_cost: Money,
    /// Item profit plus phone profit.
    pub total_profit: Money,
    pub phone_profit: Money,
    pub cash: Money,
    pub card: Money,
    pub credit: Money,
    pub credit_unpaid: Money,
    /// Sorted by revenue, descending.
    pub products: Vec<ProductStat>,
}

impl MonthlyReport {
    pub fn is_empty(&self) -> bool {
        self.sales_count == 0
    }
}

/// Builds the monthly report from the month's sales and their lines.
pub fn monthly_report(period: &str, sales: &[SaleFact], lines: &[LineFact]) -> MonthlyReport {
    let mut report = MonthlyReport {
        period: period.to_string(),
        sales_count: sales.len() as i64,
        total_revenue: Money::zero(),
        total_cost: Money::zero(),
        total_profit: Money::zero(),
        phone_profit: Money::zero(),
        cash: Money::zero(),
        card: Money::zero(),
        credit: Money::zero(),
        credit_unpaid: Money::zero(),
        products: Vec::new(),
    };

    for sale in sales {
        report.total_revenue += sale.total;
        match sale.payment_method {
            PaymentMethod::Cash => report.cash += sale.total,
            PaymentMethod::Card => report.card += sale.total,
            PaymentMethod::Credit => report.credit += sale.total,
        }
        report.phone_profit += sale.phone_profit();
        report.credit_unpaid += sale.credit_unpaid();
    }

    let mut by_product: HashMap<&str, ProductStat> = HashMap::new();
    for line in lines {
        let stat = by_product
            .entry(line.product_id.as_str())
            .or_insert_with(|| ProductStat {
                name: line.product_name.clone(),
                quantity: 0,
                revenue: Money::zero(),
                cost: Money::zero(),
                profit: Money::zero(),
            });
        stat.quantity += line.quantity;
        stat.revenue += line.revenue();
        stat.cost += line.cost();
        stat.profit += line.profit();
        report.total_cost += line.cost();
        report.total_profit += line.profit();
    }
    report.total_profit += report.phone_profit;

    report.products = by_product.into_values().collect();
    report
        .products
        .sort_by(|a, b| b.revenue.cmp(&a.revenue).then_with(|| a.name.cmp(&b.name)));
    report
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn sale(id: &str, when: DateTime<Utc>, total: i64, method: PaymentMethod) -> SaleFact {
        SaleFact {
            sale_id: id.into(),
            created_at: when,
            total: Money::from_minor(total),
            payment_method: method,
            total_paid: Money::from_minor(total),
            phone: None,
        }
    }

    fn line(sale_id: &str, when: DateTime<Utc>, product: &str, qty: i64, price: i64, cost: i64) -> LineFact {
        LineFact {
            sale_id: sale_id.into(),
            created_at: when,
            product_id: product.into(),
            product_name: product.to_uppercase(),
            quantity: qty,
            unit_price: Money::from_minor(price),
            unit_cost: Money::from_minor(cost),
        }
    }

    #[test]
    fn test_week_bucket_approximation() {
        // 2023-01-01 is a Sunday: offset 1, so Jan 1..=6 are week 1
        assert_eq!(bucket_key(ReportBucket::Week, at(2023, 1, 1)), "2023-W1");
        assert_eq!(bucket_key(ReportBucket::Week, at(2023, 1, 6)), "2023-W1");
        assert_eq!(bucket_key(ReportBucket::Week, at(2023, 1, 7)), "2023-W2");
        // 2024-01-01 is a Monday: offset 2
        assert_eq!(bucket_key(ReportBucket::Week, at(2024, 1, 6)), "2024-W2");
    }

    #[test]
    fn test_bucket_order_is_chronological() {
        let sales = vec![
            sale("a", at(2024, 3, 10), 100, PaymentMethod::Cash),
            sale("b", at(2024, 2, 20), 100, PaymentMethod::Cash),
        ];
        let rows = summarize(ReportBucket::Week, &sales, &[]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].period, "2024-W8");
        assert_eq!(rows[1].period, "2024-W11");
    }

    #[test]
    fn test_day_buckets_reconcile_with_month() {
        let sales = vec![
            sale("a", at(2024, 5, 1), 1500, PaymentMethod::Cash),
            sale("b", at(2024, 5, 1), 700, PaymentMethod::Card),
            sale("c", at(2024, 5, 20), 300, PaymentMethod::Cash),
        ];
        let lines = vec![
            line("a", at(2024, 5, 1), "p", 10, 150, 100),
            line("b", at(2024, 5, 1), "q", 1, 700, 0),
            line("c", at(2024, 5, 20), "p", 2, 150, 100),
        ];

        let days = summarize(ReportBucket::Day, &sales, &lines);
        let month = summarize(ReportBucket::Month, &sales, &lines);
        assert_eq!(days.len(), 2);
        assert_eq!(month.len(), 1);

        let day_revenue: Money = days.iter().map(|r| r.revenue).sum();
        let day_profit: Money = days.iter().map(|r| r.profit).sum();
        assert_eq!(day_revenue, month[0].revenue);
        assert_eq!(day_revenue.minor(), 2500);
        assert_eq!(day_profit, month[0].profit);
        assert_eq!(day_profit.minor(), 500 + 700 + 100);
        assert_eq!(days[0].cash.minor(), 1500);
        assert_eq!(days[0].card.minor(), 700);
        assert_eq!(days[0].avg.minor(), 1100);
    }

    #[test]
    fn test_credit_phone_profit_is_collected_only() {
        let mut credit = sale("c", at(2024, 5, 2), 1000, PaymentMethod::Credit);
        credit.total_paid = Money::from_minor(700);
        credit.phone = Some(PhoneFact {
            sale_price: Money::from_minor(1000),
            purchase_price: Money::from_minor(600),
        });

        let rows = summarize(ReportBucket::Day, &[credit], &[]);
        assert_eq!(rows[0].profit.minor(), 100);
        assert_eq!(rows[0].credit.minor(), 1000);
        assert_eq!(rows[0].credit_unpaid.minor(), 300);
    }

    #[test]
    fn test_category_mode_counts_distinct_sales() {
        let lines = vec![
            line("a", at(2024, 5, 1), "p", 1, 100, 50),
            line("a", at(2024, 5, 1), "q", 1, 200, 50),
            line("b", at(2024, 5, 1), "p", 1, 100, 50),
        ];
        let rows = summarize_lines(ReportBucket::Day, &lines);
        assert_eq!(rows[0].count, 2);
        assert_eq!(rows[0].revenue.minor(), 400);
        assert_eq!(rows[0].profit.minor(), 250);
        assert_eq!(rows[0].cash, Money::zero());
    }

    #[test]
    fn test_top_products() {
        let lines = vec![
            line("a", at(2024, 5, 1), "p", 10, 150, 0),
            line("b", at(2024, 5, 1), "q", 1, 5000, 0),
            line("c", at(2024, 5, 1), "p", 5, 150, 0),
            line("c", at(2024, 5, 1), "r", 1, 10, 0),
        ];
        let top = top_products(&lines, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].product_id, "q");
        assert_eq!(top[1].product_id, "p");
        assert_eq!(top[1].qty, 15);
        assert_eq!(top[1].revenue.minor(), 2250);
    }

    #[test]
    fn test_monthly_report_totals() {
        let sales = vec![
            sale("a", at(2024, 5, 1), 1500, PaymentMethod::Cash),
            sale("b", at(2024, 5, 3), 400, PaymentMethod::Card),
        ];
        let lines = vec![
            line("a", at(2024, 5, 1), "p", 10, 150, 100),
            line("b", at(2024, 5, 3), "hotdog", 1, 400, 0),
        ];
        let report = monthly_report("2024-05", &sales, &lines);
        assert_eq!(report.sales_count, 2);
        assert_eq!(report.total_revenue.minor(), 1900);
        assert_eq!(report.total_cost.minor(), 1000);
        assert_eq!(report.total_profit.minor(), 900);
        assert_eq!(report.products[0].name, "P");
        assert!(!report.is_empty());
    }
}
