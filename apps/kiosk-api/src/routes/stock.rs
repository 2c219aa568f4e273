//! Stock intake, write-off, the movement ledger and the stock export.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use kiosk_core::period::DateRange;
use kiosk_core::{MovementType, Page, PageRequest, Product};
use kiosk_db::repository::movement::{MovementFilter, MovementView};
use kiosk_db::service::inventory::{IssueStock, ReceiveStock};
use serde::Deserialize;

use crate::auth::{AdminUser, CurrentUser};
use crate::error::ApiResult;
use crate::export::{stock_csv, CsvFile};
use crate::extract::{ApiJson, ApiQuery};
use crate::AppState;

const DEFAULT_LIMIT: u32 = 20;
const MAX_LIMIT: u32 = 100;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub product_id: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/in", post(stock_in))
        .route("/out", post(stock_out))
        .route("/movements", get(list_movements))
        .route("/export.csv", get(export_stock))
}

/// Receives goods; `quantity` is in packs when the product is packaged.
pub async fn stock_in(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
    ApiJson(input): ApiJson<ReceiveStock>,
) -> ApiResult<Json<Product>> {
    Ok(Json(state.db.inventory().receive_stock(&input, &user.id).await?))
}

/// Writes off stock; refused with 422 when it would go negative.
pub async fn stock_out(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
    ApiJson(input): ApiJson<IssueStock>,
) -> ApiResult<Json<Product>> {
    Ok(Json(state.db.inventory().issue_stock(&input, &user.id).await?))
}

pub async fn list_movements(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiQuery(query): ApiQuery<MovementQuery>,
) -> ApiResult<Json<Page<MovementView>>> {
    let kind = query
        .kind
        .as_deref()
        .filter(|k| !k.is_empty())
        .map(str::parse::<MovementType>)
        .transpose()?;

    let filter = MovementFilter {
        range: DateRange::parse(query.from.as_deref(), query.to.as_deref())?,
        kind,
        product_id: query.product_id.filter(|id| !id.is_empty()),
    };
    let page = PageRequest::new(query.page, query.limit, DEFAULT_LIMIT, MAX_LIMIT);

    Ok(Json(state.db.movements().list(&filter, page).await?))
}

pub async fn export_stock(State(state): State<AppState>, _user: CurrentUser) -> ApiResult<CsvFile> {
    let products = state.db.products().all().await?;
    Ok(CsvFile::new("stock.csv", stock_csv(&products)?))
}
