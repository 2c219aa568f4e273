//! Sale endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use kiosk_core::period::DateRange;
use kiosk_core::{Page, PageRequest, Sale};
use kiosk_db::repository::sale::{SaleDetail, SaleView};
use kiosk_db::service::checkout::NewSale;
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::export::{receipt_csv, sales_csv, CsvFile};
use crate::extract::{ApiJson, ApiQuery};
use crate::routes::RangeQuery;
use crate::AppState;

const DEFAULT_LIMIT: u32 = 20;
const MAX_LIMIT: u32 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct SaleListQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_sales).post(create_sale))
        .route("/export.csv", get(export_sales))
        .route("/{id}", get(get_sale))
        .route("/{id}/receipt.csv", get(sale_receipt))
}

/// Rings up a cart. All lines commit together or not at all.
pub async fn create_sale(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<NewSale>,
) -> ApiResult<(StatusCode, Json<Sale>)> {
    let sale = state.db.checkout().create_sale(&input, &user.id).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

pub async fn list_sales(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiQuery(query): ApiQuery<SaleListQuery>,
) -> ApiResult<Json<Page<SaleView>>> {
    let range = DateRange::parse(query.from.as_deref(), query.to.as_deref())?;
    let page = PageRequest::new(query.page, query.limit, DEFAULT_LIMIT, MAX_LIMIT);
    Ok(Json(state.db.sales().list(range, page).await?))
}

async fn load_detail(state: &AppState, id: &str) -> ApiResult<SaleDetail> {
    state
        .db
        .sales()
        .get_detail(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Sale not found: {}", id)))
}

pub async fn get_sale(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<SaleDetail>> {
    Ok(Json(load_detail(&state, &id).await?))
}

pub async fn sale_receipt(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<CsvFile> {
    let detail = load_detail(&state, &id).await?;
    Ok(CsvFile::new(format!("receipt_{}.csv", id), receipt_csv(&detail)?))
}

pub async fn export_sales(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> ApiResult<CsvFile> {
    let rows = state.db.sales().export_rows(query.range()?).await?;
    Ok(CsvFile::new("sales.csv", sales_csv(&rows)?))
}
