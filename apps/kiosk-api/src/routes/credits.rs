//! Credit sub-ledger endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use kiosk_core::CreditPayment;
use kiosk_db::repository::credit::CreditView;
use kiosk_db::service::credit::NewCreditPayment;

use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_credits))
        .route("/payment", post(record_payment))
        .route("/{sale_id}", get(get_credit))
}

/// Every credit sale with what has been paid and what remains.
pub async fn list_credits(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> ApiResult<Json<Vec<CreditView>>> {
    Ok(Json(state.db.credits().list().await?))
}

pub async fn get_credit(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(sale_id): Path<String>,
) -> ApiResult<Json<CreditView>> {
    state
        .db
        .credits()
        .get(&sale_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Credit sale not found: {}", sale_id)))
}

/// Records an installment. Over-payment and non-credit sales are 422.
pub async fn record_payment(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<NewCreditPayment>,
) -> ApiResult<(StatusCode, Json<CreditPayment>)> {
    let payment = state
        .db
        .credit_ledger()
        .record_payment(&input, &user.id)
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}
