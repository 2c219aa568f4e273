//! Phone endpoints: intake, listing, history and sale (cash, card or credit).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use kiosk_core::period::DateRange;
use kiosk_core::{Page, PageRequest, Phone, PhoneMovementType, PhoneStatus, Sale};
use kiosk_db::repository::phone::{PhoneDetail, PhoneHistoryFilter, PhoneMovementView};
use kiosk_db::service::phone::{NewPhone, SellPhone};
use serde::Deserialize;

use crate::auth::{AdminUser, CurrentUser};
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiQuery};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PhoneListQuery {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PhoneHistoryQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_phones).post(create_phone))
        .route("/movements/history", get(phone_history))
        .route("/{id}", get(get_phone))
        .route("/{id}/sell", post(sell_phone))
}

pub async fn create_phone(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
    ApiJson(input): ApiJson<NewPhone>,
) -> ApiResult<(StatusCode, Json<Phone>)> {
    let phone = state.db.phone_sales().create_phone(&input, &user.id).await?;
    Ok((StatusCode::CREATED, Json(phone)))
}

/// Newest first; `limit` defaults to 100 and is clamped to 1..=1000.
pub async fn list_phones(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiQuery(query): ApiQuery<PhoneListQuery>,
) -> ApiResult<Json<Page<Phone>>> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<PhoneStatus>)
        .transpose()?;
    let page = PageRequest::new(query.page, query.limit, 100, 1000);
    Ok(Json(state.db.phones().list(status, page).await?))
}

pub async fn get_phone(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<PhoneDetail>> {
    state
        .db
        .phones()
        .get_detail(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Phone not found: {}", id)))
}

/// Movement log across all phones; `limit` defaults to 20, at most 100.
pub async fn phone_history(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiQuery(query): ApiQuery<PhoneHistoryQuery>,
) -> ApiResult<Json<Page<PhoneMovementView>>> {
    let kind = query
        .kind
        .as_deref()
        .filter(|k| !k.is_empty())
        .map(str::parse::<PhoneMovementType>)
        .transpose()?;
    let filter = PhoneHistoryFilter {
        range: DateRange::parse(query.from.as_deref(), query.to.as_deref())?,
        kind,
    };
    let page = PageRequest::new(query.page, query.limit, 20, 100);
    Ok(Json(state.db.phones().history(&filter, page).await?))
}

pub async fn sell_phone(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<SellPhone>,
) -> ApiResult<(StatusCode, Json<Sale>)> {
    let sale = state.db.phone_sales().sell_phone(&id, &input, &user.id).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}
