//! HTTP handlers, one module per resource.

pub mod auth;
pub mod categories;
pub mod credits;
pub mod phones;
pub mod products;
pub mod reports;
pub mod sales;
pub mod stock;
pub mod users;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use kiosk_core::period::DateRange;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: bool,
    pub version: &'static str,
}

/// Liveness plus a database round-trip.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = state.db.health_check().await;
    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(HealthResponse {
            status: if database { "ok" } else { "degraded" },
            database,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

/// `{ "message": "OK" }` for deletes and logout.
#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

impl MessageResponse {
    pub fn ok() -> Json<Self> {
        Json(MessageResponse { message: "OK" })
    }
}

/// `?from&to` accepted by every ranged endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

impl RangeQuery {
    pub fn range(&self) -> ApiResult<DateRange> {
        Ok(DateRange::parse(self.from.as_deref(), self.to.as_deref())?)
    }
}
