//! # Notification Messages
//!
//! Text of the messages delivered to the shop's chat after stock changes,
//! sales and at month end. Messages use Telegram's HTML parse mode, so
//! every interpolated value is escaped.
//!
//! Formatting only: the texts are built inside the transaction that
//! enqueues them, delivery happens later in the outbox worker.

use chrono::{DateTime, Utc};

use crate::money::Money;
use crate::report::MonthlyReport;
use crate::types::PaymentMethod;

/// Telegram rejects messages above 4096 characters; leave headroom.
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// Escapes `<`, `>` and `&` for HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            _ => out.push(c),
        }
    }
    out
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

fn line(out: &mut String, label: &str, value: impl std::fmt::Display) {
    out.push_str(label);
    out.push_str(": <b>");
    out.push_str(&escape_html(&value.to_string()));
    out.push_str("</b>\n");
}

// =============================================================================
// Stock
// =============================================================================

/// A committed stock-in or stock-out.
#[derive(Debug, Clone)]
pub struct StockNotice<'a> {
    pub product_name: &'a str,
    pub category_name: Option<&'a str>,
    /// Units moved, after pack-size normalization.
    pub quantity: i64,
    pub unit_cost: Option<Money>,
    pub new_stock: i64,
    pub note: Option<&'a str>,
    pub username: &'a str,
    pub at: DateTime<Utc>,
}

/// Message for a stock receipt.
pub fn stock_in_message(n: &StockNotice<'_>) -> String {
    let mut out = String::from("📦 <b>STOCK RECEIVED</b>\n");
    line(&mut out, "Product", n.product_name);
    line(&mut out, "Quantity", n.quantity);
    match n.unit_cost {
        Some(cost) => {
            line(&mut out, "Unit cost", cost);
            line(&mut out, "Total cost", cost.multiply_quantity(n.quantity));
        }
        None => line(&mut out, "Unit cost", "not set"),
    }
    line(&mut out, "New stock", n.new_stock);
    line(&mut out, "Date", timestamp(n.at));
    line(&mut out, "Received by", n.username);
    if let Some(category) = n.category_name {
        line(&mut out, "Category", category);
    }
    out
}

/// Message for a stock write-off.
pub fn stock_out_message(n: &StockNotice<'_>) -> String {
    let mut out = String::from("📤 <b>STOCK ISSUED</b>\n");
    line(&mut out, "Product", n.product_name);
    line(&mut out, "Quantity", n.quantity);
    line(&mut out, "New stock", n.new_stock);
    line(&mut out, "Date", timestamp(n.at));
    line(&mut out, "Issued by", n.username);
    if let Some(note) = n.note.filter(|s| !s.trim().is_empty()) {
        line(&mut out, "Reason", note);
    }
    if let Some(category) = n.category_name {
        line(&mut out, "Category", category);
    }
    out
}

// =============================================================================
// Sales
// =============================================================================

/// Stock left after a sale line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    Stock(i64),
    /// Composite lines report their components instead.
    Components { buns: i64, sausages: i64 },
}

/// One sold line with the stock left after commit.
#[derive(Debug, Clone)]
pub struct SaleLineNotice<'a> {
    pub product_name: &'a str,
    pub quantity: i64,
    pub unit_price: Money,
    pub remaining: Remaining,
}

/// Message for a committed goods sale: one block per line.
pub fn sale_message(
    lines: &[SaleLineNotice<'_>],
    total: Money,
    payment_method: PaymentMethod,
    username: &str,
    at: DateTime<Utc>,
) -> String {
    let mut out = String::from("🛒 <b>SALE</b>\n");
    for l in lines {
        out.push('\n');
        out.push_str(&format!("<b>{}</b>\n", escape_html(l.product_name)));
        line(&mut out, "Quantity", l.quantity);
        line(&mut out, "Price", l.unit_price);
        match l.remaining {
            Remaining::Stock(stock) => line(&mut out, "Stock left", stock),
            Remaining::Components { buns, sausages } => {
                line(&mut out, "Buns left", buns);
                line(&mut out, "Sausages left", sausages);
            }
        }
    }
    out.push('\n');
    line(&mut out, "Total", total);
    line(&mut out, "Payment", payment_method.as_str());
    line(&mut out, "Date", timestamp(at));
    line(&mut out, "Seller", username);
    out
}

/// A committed phone sale.
#[derive(Debug, Clone)]
pub struct PhoneSaleNotice<'a> {
    pub model: &'a str,
    pub imei: &'a str,
    pub sale_price: Money,
    pub purchase_price: Money,
    pub payment_method: PaymentMethod,
    pub customer: Option<String>,
    pub initial_payment: Option<Money>,
    pub monthly_payment: Option<Money>,
    pub credit_months: Option<i64>,
    pub username: &'a str,
    pub at: DateTime<Utc>,
}

/// Message for a committed phone sale.
pub fn phone_sale_message(n: &PhoneSaleNotice<'_>) -> String {
    let mut out = String::from("📱 <b>PHONE SOLD</b>\n");
    line(&mut out, "Model", n.model);
    line(&mut out, "IMEI", n.imei);
    line(&mut out, "Sale price", n.sale_price);
    line(&mut out, "Purchase price", n.purchase_price);
    line(&mut out, "Payment", n.payment_method.as_str());
    if n.payment_method == PaymentMethod::Credit {
        if let Some(customer) = &n.customer {
            line(&mut out, "Customer", customer);
        }
        line(&mut out, "Initial payment", n.initial_payment.unwrap_or_default());
        line(&mut out, "Monthly payment", n.monthly_payment.unwrap_or_default());
        line(&mut out, "Months", n.credit_months.unwrap_or_default());
    }
    line(&mut out, "Date", timestamp(n.at));
    line(&mut out, "Seller", n.username);
    out
}

// =============================================================================
// Monthly Report
// =============================================================================

/// Message for the monthly report.
pub fn monthly_report_message(report: &MonthlyReport) -> String {
    let mut out = String::from("📊 <b>MONTHLY REPORT</b>\n\n");
    line(&mut out, "Period", &report.period);

    if report.is_empty() {
        out.push_str("\nNo sales in this period.\n");
        return out;
    }

    if !report.products.is_empty() {
        out.push_str("\n📦 <b>BY PRODUCT</b>\n");
        for p in &report.products {
            out.push('\n');
            out.push_str(&format!("<b>{}</b>\n", escape_html(&p.name)));
            line(&mut out, "   Sold", p.quantity);
            line(&mut out, "   Revenue", p.revenue);
            line(&mut out, "   Cost", p.cost);
            line(&mut out, "   Profit", p.profit);
        }
    }

    out.push_str("\n📈 <b>SUMMARY</b>\n");
    line(&mut out, "Revenue", report.total_revenue);
    line(&mut out, "Cost", report.total_cost);
    line(&mut out, "Profit", report.total_profit);
    line(&mut out, "Phone profit", report.phone_profit);
    line(&mut out, "Sales", report.sales_count);

    out.push_str("\n💳 <b>BY PAYMENT METHOD</b>\n");
    line(&mut out, "Cash", report.cash);
    line(&mut out, "Card", report.card);
    line(&mut out, "Credit", report.credit);
    line(&mut out, "Credit outstanding", report.credit_unpaid);
    out
}

// =============================================================================
// Chunking
// =============================================================================

/// Splits a message into chunks of at most `max_chars` characters,
/// breaking on line boundaries. A single line longer than `max_chars` is
/// split inside the line.
///
/// ## Example
/// ```rust
/// use kiosk_core::message::chunk_message;
///
/// let chunks = chunk_message("aaa\nbbb\nccc", 8);
/// assert_eq!(chunks, vec!["aaa\nbbb", "ccc"]);
/// ```
pub fn chunk_message(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for raw in text.lines() {
        let pieces: Vec<String> = if raw.chars().count() > max_chars {
            raw.chars()
                .collect::<Vec<_>>()
                .chunks(max_chars)
                .map(|c| c.iter().collect())
                .collect()
        } else {
            vec![raw.to_string()]
        };

        for piece in pieces {
            let len = piece.chars().count();
            let needed = if current.is_empty() { len } else { current_len + 1 + len };
            if needed > max_chars && !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if !current.is_empty() {
                current.push('\n');
                current_len += 1;
            }
            current.push_str(&piece);
            current_len += len;
        }
    }
    if !current.trim().is_empty() {
        chunks.push(current);
    }
    chunks
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("Fish & <Chips>"), "Fish &amp; &lt;Chips&gt;");
    }

    #[test]
    fn test_stock_in_message() {
        let text = stock_in_message(&StockNotice {
            product_name: "Pork Sausage",
            category_name: Some("Sausages"),
            quantity: 60,
            unit_cost: Some(Money::from_minor(100)),
            new_stock: 60,
            note: None,
            username: "admin",
            at: now(),
        });
        assert!(text.contains("Quantity: <b>60</b>"));
        assert!(text.contains("Total cost: <b>60.00</b>"));
        assert!(text.contains("Category: <b>Sausages</b>"));
    }

    #[test]
    fn test_sale_message_reports_components() {
        let text = sale_message(
            &[SaleLineNotice {
                product_name: "Hot Dog",
                quantity: 3,
                unit_price: Money::from_minor(400),
                remaining: Remaining::Components { buns: 7, sausages: 4 },
            }],
            Money::from_minor(1200),
            PaymentMethod::Cash,
            "staff",
            now(),
        );
        assert!(text.contains("Buns left: <b>7</b>"));
        assert!(text.contains("Sausages left: <b>4</b>"));
        assert!(text.contains("Total: <b>12.00</b>"));
    }

    #[test]
    fn test_chunking_respects_limit() {
        let text = (0..500).map(|i| format!("line number {i}")).collect::<Vec<_>>().join("\n");
        let chunks = chunk_message(&text, MAX_MESSAGE_CHARS);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= MAX_MESSAGE_CHARS));
        assert_eq!(chunks.join("\n"), text);
    }

    #[test]
    fn test_chunking_splits_long_line() {
        let chunks = chunk_message(&"x".repeat(10), 4);
        assert_eq!(chunks, vec!["xxxx", "xxxx", "xx"]);
    }

    #[test]
    fn test_empty_monthly_report() {
        let report = crate::report::monthly_report("2024-04", &[], &[]);
        let text = monthly_report_message(&report);
        assert!(text.contains("No sales in this period."));
    }
}
