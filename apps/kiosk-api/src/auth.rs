//! # Session Authentication
//!
//! Sessions are a signed JWT carried in an HTTP-only cookie named `token`.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Cookie: token=<jwt>                                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  require_auth (middleware)                                              │
//! │       ├── no cookie / bad signature / expired ──► 401                   │
//! │       ├── user deleted since login            ──► 401                   │
//! │       └── OK: CurrentUser { id, role } inserted into extensions         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  handler(CurrentUser)   any signed-in user                              │
//! │  handler(AdminUser)     ADMIN only, otherwise 403                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The role is re-read from the database on every request, so demoting a
//! user takes effect without waiting for the token to expire.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::CookieJar;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use kiosk_core::Role;
use kiosk_db::repository::user::NewUser;
use kiosk_db::Database;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::AppState;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "token";

// =============================================================================
// Tokens
// =============================================================================

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,

    /// Role at login time
    pub role: Role,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// Signs and validates session tokens.
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtManager {
    pub fn new(secret: &str, ttl_days: i64) -> Self {
        JwtManager {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::days(ttl_days),
        }
    }

    /// Session lifetime, also used as the cookie max-age.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues a token for a user.
    pub fn issue(&self, user_id: &str, role: Role) -> Result<String, ApiError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ApiError::internal(format!("Failed to sign token: {}", e)))
    }

    /// Validates signature and expiry.
    pub fn validate(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "Rejected session token");
                ApiError::unauthorized("Session is invalid or expired")
            })
    }
}

// =============================================================================
// Passwords
// =============================================================================

/// Hashes a password into a PHC string.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))
}

/// Checks a password against a stored PHC string.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

// =============================================================================
// Middleware & Extractors
// =============================================================================

/// The signed-in user, inserted by [`require_auth`].
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
    pub role: Role,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Rejects requests without a valid session cookie.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .ok_or_else(|| ApiError::unauthorized("Not signed in"))?;

    let claims = state.jwt.validate(&token)?;

    let user = state
        .db
        .users()
        .get(&claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Session is invalid or expired"))?;

    request.extensions_mut().insert(CurrentUser {
        id: user.id,
        username: user.username,
        role: user.role,
    });

    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Not signed in"))
    }
}

/// A signed-in user with the ADMIN role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub CurrentUser);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ApiError::forbidden());
        }
        Ok(AdminUser(user))
    }
}

// =============================================================================
// Bootstrap
// =============================================================================

/// Creates the configured admin when the user table is empty.
///
/// Returns `true` when an account was created.
pub async fn bootstrap_admin(db: &Database, config: &AppConfig) -> Result<bool, ApiError> {
    if db.users().count().await? > 0 {
        return Ok(false);
    }

    let username = config.admin_username.trim().to_lowercase();
    let user = db
        .users()
        .insert(NewUser {
            email: Some(format!("{}@local", username)),
            username,
            password_hash: hash_password(&config.admin_password)?,
            role: Role::Admin,
        })
        .await?;

    info!(user_id = %user.id, username = %user.username, "Bootstrap admin created");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_token_round_trip() {
        let jwt = JwtManager::new("secret", 7);
        let token = jwt.issue("u1", Role::Staff).unwrap();
        let claims = jwt.validate(&token).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.role, Role::Staff);
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
    }

    #[test]
    fn test_token_from_other_secret_is_rejected() {
        let token = JwtManager::new("one", 7).issue("u1", Role::Admin).unwrap();
        let err = JwtManager::new("two", 7).validate(&token).unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let jwt = JwtManager::new("secret", 7);
        let claims = Claims {
            sub: "u1".into(),
            role: Role::Staff,
            iat: Utc::now().timestamp() - 10_000,
            exp: Utc::now().timestamp() - 5_000,
        };
        let token = encode(&Header::default(), &claims, &jwt.encoding).unwrap();
        assert!(jwt.validate(&token).is_err());
    }

    #[test]
    fn test_password_hash_verifies() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
        assert!(!verify_password("hunter22", "not-a-hash"));
    }
}
