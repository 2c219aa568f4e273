//! User administration (ADMIN only).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use kiosk_core::validation::{validate_password, validate_username};
use kiosk_core::{Role, User};
use kiosk_db::repository::user::NewUser;
use serde::Deserialize;

use crate::auth::{hash_password, AdminUser};
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::routes::MessageResponse;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub password: Option<String>,
    pub role: Option<Role>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/{id}", put(update_user).delete(delete_user))
}

pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(state.db.users().list().await?))
}

/// Creates an account. The email defaults to `<username>@local`.
pub async fn create_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiJson(request): ApiJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let username = request.username.trim().to_lowercase();
    validate_username(&username)?;
    validate_password(&request.password)?;

    let user = state
        .db
        .users()
        .insert(NewUser {
            email: Some(format!("{}@local", username)),
            username,
            password_hash: hash_password(&request.password)?,
            role: request.role,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    let password_hash = match request.password.as_deref() {
        Some(password) => {
            validate_password(password)?;
            Some(hash_password(password)?)
        }
        None => None,
    };

    let user = state
        .db
        .users()
        .update(&id, password_hash, request.role)
        .await?;
    Ok(Json(user))
}

/// Deletes an account. Users with sales or movements are kept (409).
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    if admin.id == id {
        return Err(ApiError::validation("You cannot delete your own account"));
    }
    state.db.users().delete(&id).await?;
    Ok(MessageResponse::ok())
}
