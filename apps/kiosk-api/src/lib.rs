//! # kiosk-api: REST Server for Kiosk POS
//!
//! axum routes over the kiosk-db services, the cookie session layer, and
//! the two background tasks (notification delivery, monthly report).
//!
//! ## Route Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  /health                          public                                │
//! │  /api/auth/login, /api/auth/logout public                               │
//! │  ─────────────────────────────── require_auth ───────────────────────── │
//! │  /api/auth/me, /api/me                                                  │
//! │  /api/users/*                     ADMIN                                 │
//! │  /api/categories, /api/products   read: any user, write: ADMIN          │
//! │  /api/stock/*                     in/out: ADMIN, reads: any user        │
//! │  /api/sales/*                     any user                              │
//! │  /api/phones/*                    create: ADMIN, sell/read: any user    │
//! │  /api/credits/*                   any user                              │
//! │  /api/reports/*                   any user                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod notifier;
pub mod routes;
pub mod scheduler;

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::{middleware, Router};
use kiosk_db::Database;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::auth::JwtManager;
use crate::config::AppConfig;

pub use error::{ApiError, ApiResult};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<AppConfig>,
    pub jwt: Arc<JwtManager>,
}

impl AppState {
    pub fn new(db: Database, config: AppConfig) -> Self {
        let jwt = JwtManager::new(&config.jwt_secret, config.jwt_ttl_days);
        AppState {
            db,
            config: Arc::new(config),
            jwt: Arc::new(jwt),
        }
    }
}

/// Builds the full application router.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .merge(routes::auth::protected_router())
        .nest("/users", routes::users::router())
        .nest("/categories", routes::categories::router())
        .nest("/products", routes::products::router())
        .nest("/stock", routes::stock::router())
        .nest("/sales", routes::sales::router())
        .nest("/phones", routes::phones::router())
        .nest("/credits", routes::credits::router())
        .nest("/reports", routes::reports::router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    let api = Router::new()
        .merge(routes::auth::public_router())
        .merge(protected);

    let mut router = Router::new()
        .route("/health", get(routes::health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = cors_layer(&state.config) {
        router = router.layer(cors);
    }

    router.with_state(state)
}

/// CORS with credentials for the configured front-end origin.
fn cors_layer(config: &AppConfig) -> Option<CorsLayer> {
    let origin = config.cors_origin.as_deref()?;
    let origin = match HeaderValue::from_str(origin) {
        Ok(origin) => origin,
        Err(_) => {
            warn!(origin = %origin, "Ignoring invalid CORS_ORIGIN");
            return None;
        }
    };

    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE]),
    )
}
