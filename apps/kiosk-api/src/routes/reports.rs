//! Report endpoints.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use kiosk_core::period::{DateRange, MonthPeriod};
use kiosk_core::report::{MonthlyReport, ReportBucket, SummaryRow, TopProduct};
use kiosk_db::service::report::DEFAULT_TOP_PRODUCTS;
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::extract::ApiQuery;
use crate::AppState;

const MAX_TOP_PRODUCTS: usize = 100;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub bucket: Option<String>,
    pub category_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopProductsQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: Option<usize>,
    pub category_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MonthlyQuery {
    /// `YYYY-MM`; the previous month when absent.
    pub month: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/summary", get(summary))
        .route("/top-products", get(top_products))
        .route("/monthly", get(monthly))
}

/// Revenue, count, payment split and profit per day/week/month/year.
pub async fn summary(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiQuery(query): ApiQuery<SummaryQuery>,
) -> ApiResult<Json<Vec<SummaryRow>>> {
    let range = DateRange::parse(query.from.as_deref(), query.to.as_deref())?;
    let bucket = match query.bucket.as_deref().filter(|b| !b.is_empty()) {
        Some(raw) => raw.parse::<ReportBucket>()?,
        None => ReportBucket::default(),
    };
    let category_id = query.category_id.as_deref().filter(|id| !id.is_empty());

    Ok(Json(state.db.reports().summary(range, bucket, category_id).await?))
}

pub async fn top_products(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiQuery(query): ApiQuery<TopProductsQuery>,
) -> ApiResult<Json<Vec<TopProduct>>> {
    let range = DateRange::parse(query.from.as_deref(), query.to.as_deref())?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_TOP_PRODUCTS)
        .clamp(1, MAX_TOP_PRODUCTS);
    let category_id = query.category_id.as_deref().filter(|id| !id.is_empty());

    Ok(Json(
        state.db.reports().top_products(range, limit, category_id).await?,
    ))
}

/// The same figures the monthly notification carries, on demand.
pub async fn monthly(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiQuery(query): ApiQuery<MonthlyQuery>,
) -> ApiResult<Json<MonthlyReport>> {
    let period = match query.month.as_deref().filter(|m| !m.is_empty()) {
        Some(raw) => raw.parse::<MonthPeriod>()?,
        None => MonthPeriod::containing(Utc::now()).previous(),
    };
    Ok(Json(state.db.reports().monthly_report(period).await?))
}
