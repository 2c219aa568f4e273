//! Login, logout and the current-user endpoint.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use kiosk_core::Role;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::{verify_password, CurrentUser, SESSION_COOKIE};
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::routes::MessageResponse;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: String,
    pub username: String,
    pub role: Role,
}

impl From<CurrentUser> for SessionUser {
    fn from(user: CurrentUser) -> Self {
        SessionUser {
            id: user.id,
            username: user.username,
            role: user.role,
        }
    }
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/auth/me", get(me))
        .route("/me", get(me))
}

/// Signs in by username or email.
///
/// A bare login without `@` also matches the `<login>@local` email that
/// accounts created through the users screen receive.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<(CookieJar, Json<SessionUser>)> {
    let login = request.login.trim().to_lowercase();
    if login.is_empty() || request.password.is_empty() {
        return Err(ApiError::validation("login and password are required"));
    }

    let users = state.db.users();
    let mut record = users.find_by_login(&login).await?;
    if record.is_none() && !login.contains('@') {
        record = users.find_by_login(&format!("{}@local", login)).await?;
    }

    let Some(record) = record.filter(|r| verify_password(&request.password, &r.password_hash))
    else {
        warn!(login = %login, "Failed login");
        return Err(ApiError::unauthorized("invalid login or password"));
    };

    let token = state.jwt.issue(&record.id, record.role)?;
    let cookie = Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.cookie_secure)
        .path("/")
        .max_age(time::Duration::seconds(state.jwt.ttl().num_seconds()))
        .build();

    info!(user_id = %record.id, username = %record.username, "User signed in");
    Ok((
        jar.add(cookie),
        Json(SessionUser {
            id: record.id,
            username: record.username,
            role: record.role,
        }),
    ))
}

/// Clears the session cookie.
pub async fn logout(jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    let cookie = Cookie::build((SESSION_COOKIE, "")).path("/").build();
    (jar.remove(cookie), MessageResponse::ok())
}

pub async fn me(user: CurrentUser) -> Json<SessionUser> {
    Json(user.into())
}
