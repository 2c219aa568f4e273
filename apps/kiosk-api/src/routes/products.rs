//! Product endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use kiosk_core::validation::validate_search_query;
use kiosk_core::{Page, PageRequest, Product};
use kiosk_db::repository::product::ProductFilter;
use kiosk_db::service::catalog::{NewProduct, ProductPatch};
use serde::Deserialize;

use crate::auth::{AdminUser, CurrentUser};
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiQuery};
use crate::routes::MessageResponse;
use crate::AppState;

const DEFAULT_LIMIT: u32 = 20;
const MAX_LIMIT: u32 = 100;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub search: Option<String>,
    pub category_id: Option<String>,
    pub active: Option<bool>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
}

/// Newest first, filtered by name/SKU substring, category and active flag.
pub async fn list_products(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> ApiResult<Json<Page<Product>>> {
    let search = match query.search.as_deref() {
        Some(raw) => Some(validate_search_query(raw)?).filter(|s| !s.is_empty()),
        None => None,
    };
    let filter = ProductFilter {
        search,
        category_id: query.category_id.filter(|id| !id.is_empty()),
        active: query.active,
    };
    let page = PageRequest::new(query.page, query.limit, DEFAULT_LIMIT, MAX_LIMIT);

    Ok(Json(state.db.products().list(&filter, page).await?))
}

pub async fn get_product(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Product>> {
    state
        .db
        .products()
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Product not found: {}", id)))
}

pub async fn create_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiJson(input): ApiJson<NewProduct>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    let product = state.db.catalog().create_product(input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// Partial update; absent fields keep their value.
pub async fn update_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<ProductPatch>,
) -> ApiResult<Json<Product>> {
    Ok(Json(state.db.catalog().update_product(&id, patch).await?))
}

pub async fn delete_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state.db.products().delete(&id).await?;
    Ok(MessageResponse::ok())
}
