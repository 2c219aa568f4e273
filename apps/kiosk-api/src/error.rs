//! # API Errors
//!
//! Every handler returns `Result<_, ApiError>`. The error carries its HTTP
//! status and a stable code; the body is `{ "code": "...", "message": "..." }`.
//!
//! ## Status Mapping
//! ```text
//! ┌──────────────────────────────────────────┬────────┬──────────────────────┐
//! │ Source                                   │ Status │ Code                 │
//! ├──────────────────────────────────────────┼────────┼──────────────────────┤
//! │ ValidationError, malformed JSON / query  │  422   │ VALIDATION_ERROR     │
//! │ missing or invalid session cookie        │  401   │ UNAUTHORIZED         │
//! │ role not allowed                         │  403   │ FORBIDDEN            │
//! │ NotFound (db or domain)                  │  404   │ NOT_FOUND            │
//! │ UniqueViolation, ForeignKeyViolation     │  409   │ CONFLICT             │
//! │ InsufficientStock                        │  422   │ INSUFFICIENT_STOCK   │
//! │ Configuration (composite)                │  422   │ CONFIGURATION_ERROR  │
//! │ phone sold, credit rules                 │  422   │ BUSINESS_RULE        │
//! │ anything else                            │  500   │ INTERNAL_ERROR       │
//! └──────────────────────────────────────────┴────────┴──────────────────────┘
//! ```
//!
//! 500s are logged with their cause; the client only sees a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use kiosk_core::{CoreError, ValidationError};
use kiosk_db::DbError;
use serde::Serialize;
use tracing::error;

/// Error returned by every handler.
#[derive(Debug, thiserror::Error)]
#[error("{status}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        ApiError {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", "Insufficient permissions")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    /// Logs the cause and hides it from the client.
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        error!(error = %cause, "Internal error");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "Internal server error",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code,
            message: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let unprocessable = StatusCode::UNPROCESSABLE_ENTITY;
        match err {
            CoreError::NotFound { .. } => ApiError::not_found(err.to_string()),
            CoreError::Validation(e) => e.into(),
            CoreError::InsufficientStock { .. } => {
                ApiError::new(unprocessable, "INSUFFICIENT_STOCK", err.to_string())
            }
            CoreError::Configuration { .. } => {
                ApiError::new(unprocessable, "CONFIGURATION_ERROR", err.to_string())
            }
            CoreError::PhoneNotAvailable { .. }
            | CoreError::NotCreditSale { .. }
            | CoreError::PaymentExceedsRemaining { .. }
            | CoreError::InvalidCreditTerms { .. } => {
                ApiError::new(unprocessable, "BUSINESS_RULE", err.to_string())
            }
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Domain(e) => e.into(),
            DbError::NotFound { .. } => ApiError::not_found(err.to_string()),
            DbError::UniqueViolation { ref field, .. } => ApiError::new(
                StatusCode::CONFLICT,
                "CONFLICT",
                format!("{} already exists", field),
            ),
            DbError::ForeignKeyViolation { .. } => ApiError::new(
                StatusCode::CONFLICT,
                "CONFLICT",
                "Record is referenced by other records",
            ),
            other => ApiError::internal(other),
        }
    }
}

/// Result type for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use kiosk_core::Money;

    #[test]
    fn test_domain_errors_map_to_statuses() {
        let err: ApiError = DbError::Domain(CoreError::InsufficientStock {
            name: "Cola".into(),
            available: 1,
            requested: 2,
        })
        .into();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code, "INSUFFICIENT_STOCK");
        assert!(err.message.contains("Cola"));

        let err: ApiError = CoreError::PaymentExceedsRemaining {
            remaining: Money::from_minor(100),
        }
        .into();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);

        let err: ApiError = CoreError::not_found("Product", "p1").into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_constraint_errors_are_conflicts() {
        let err: ApiError = DbError::duplicate("imei", "123").into();
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.message, "imei already exists");

        let err: ApiError = DbError::ForeignKeyViolation {
            message: "FOREIGN KEY constraint failed".into(),
        }
        .into();
        assert_eq!(err.status, StatusCode::CONFLICT);
    }

    #[test]
    fn test_internal_errors_hide_the_cause() {
        let err: ApiError = DbError::QueryFailed("no such table: sales".into()).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("sales"));
    }
}
