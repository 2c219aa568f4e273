//! # CSV Exports
//!
//! Sales, receipt and stock exports. The header row comes from the row
//! struct's field names; quoting follows RFC 4180 (the `csv` crate quotes
//! any cell containing a comma, quote or newline).
//!
//! Money columns are written as decimal major units (`15.00`) since these
//! files are opened in spreadsheets, not parsed by the front-end.

use axum::http::header;
use axum::response::{IntoResponse, Response};
use kiosk_core::{Money, Product};
use kiosk_db::repository::sale::{SaleDetail, SaleExportRow};
use serde::Serialize;

use crate::error::ApiError;

/// A CSV body served as a download.
#[derive(Debug)]
pub struct CsvFile {
    filename: String,
    body: Vec<u8>,
}

impl CsvFile {
    pub fn new(filename: impl Into<String>, body: Vec<u8>) -> Self {
        CsvFile {
            filename: filename.into(),
            body,
        }
    }
}

impl IntoResponse for CsvFile {
    fn into_response(self) -> Response {
        (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", self.filename),
                ),
            ],
            self.body,
        )
            .into_response()
    }
}

fn write_rows<T: Serialize>(rows: impl IntoIterator<Item = T>) -> Result<Vec<u8>, ApiError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row).map_err(ApiError::internal)?;
    }
    writer
        .into_inner()
        .map_err(|e| ApiError::internal(e.error()))
}

// =============================================================================
// Sales
// =============================================================================

#[derive(Serialize)]
struct SaleCsvRow<'a> {
    sale_id: &'a str,
    created_at: String,
    payment_method: &'static str,
    cashier: &'a str,
    product: &'a str,
    sku: &'a str,
    quantity: i64,
    unit_price: String,
    unit_cost: String,
    line_total: String,
    sale_total: String,
}

/// One line per sold item across the exported sales.
pub fn sales_csv(rows: &[SaleExportRow]) -> Result<Vec<u8>, ApiError> {
    write_rows(rows.iter().map(|row| SaleCsvRow {
        sale_id: &row.sale_id,
        created_at: row.created_at.to_rfc3339(),
        payment_method: row.payment_method.as_str(),
        cashier: &row.username,
        product: &row.product_name,
        sku: &row.sku,
        quantity: row.quantity,
        unit_price: row.unit_price.to_string(),
        unit_cost: row.unit_cost.to_string(),
        line_total: row.unit_price.multiply_quantity(row.quantity).to_string(),
        sale_total: row.sale_total.to_string(),
    }))
}

#[derive(Serialize)]
struct ReceiptCsvRow<'a> {
    product: &'a str,
    sku: &'a str,
    quantity: i64,
    unit_price: String,
    line_total: String,
}

/// Receipt lines for a single sale, closed by discount and total rows.
pub fn receipt_csv(detail: &SaleDetail) -> Result<Vec<u8>, ApiError> {
    let mut lines: Vec<ReceiptCsvRow<'_>> = detail
        .items
        .iter()
        .map(|item| ReceiptCsvRow {
            product: &item.product_name,
            sku: &item.sku,
            quantity: item.quantity,
            unit_price: item.unit_price.to_string(),
            line_total: item.unit_price.multiply_quantity(item.quantity).to_string(),
        })
        .collect();

    if let Some(phone) = &detail.phone {
        lines.push(ReceiptCsvRow {
            product: &phone.model,
            sku: &phone.imei,
            quantity: 1,
            unit_price: phone.sale_price.to_string(),
            line_total: phone.sale_price.to_string(),
        });
    }

    if let Some(discount) = detail.sale.discount.filter(|d| d.is_positive()) {
        lines.push(ReceiptCsvRow {
            product: "Discount",
            sku: "",
            quantity: 1,
            unit_price: String::new(),
            line_total: (Money::zero() - discount).to_string(),
        });
    }

    lines.push(ReceiptCsvRow {
        product: "Total",
        sku: "",
        quantity: 0,
        unit_price: String::new(),
        line_total: detail.sale.total.to_string(),
    });

    write_rows(lines)
}

// =============================================================================
// Stock
// =============================================================================

#[derive(Serialize)]
struct StockCsvRow<'a> {
    id: &'a str,
    name: &'a str,
    sku: &'a str,
    stock: i64,
    price: String,
}

/// Stock on hand for every product.
pub fn stock_csv(products: &[Product]) -> Result<Vec<u8>, ApiError> {
    write_rows(products.iter().map(|p| StockCsvRow {
        id: &p.id,
        name: &p.name,
        sku: &p.sku,
        stock: p.stock,
        price: p.price.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kiosk_core::PaymentMethod;

    #[test]
    fn test_sales_csv_quotes_cells() {
        let rows = vec![SaleExportRow {
            sale_id: "s1".into(),
            created_at: Utc::now(),
            payment_method: PaymentMethod::Cash,
            username: "anna".into(),
            product_name: "Cola, 0.5\"".into(),
            sku: "COLA05".into(),
            quantity: 2,
            unit_price: Money::from_minor(150),
            unit_cost: Money::from_minor(90),
            sale_total: Money::from_minor(300),
        }];

        let text = String::from_utf8(sales_csv(&rows).unwrap()).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "sale_id,created_at,payment_method,cashier,product,sku,quantity,unit_price,unit_cost,line_total,sale_total"
        );
        let line = lines.next().unwrap();
        assert!(line.contains("\"Cola, 0.5\"\"\""));
        assert!(line.ends_with(",2,1.50,0.90,3.00,3.00"));
    }

    #[test]
    fn test_empty_export_is_empty() {
        assert!(stock_csv(&[]).unwrap().is_empty());
    }
}
