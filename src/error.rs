// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::auth::token::TokenError;
use crate::database::manager::DatabaseError;
use crate::filter::error::FilterError;

const INTERNAL_MESSAGE: &str = "An error occurred while processing your request";

/// Why a request failed authentication. All reasons map to 401; the reason
/// is kept so logs can tell an expired token from a forged one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    MissingCredential,
    Expired,
    Malformed,
    WrongPurpose,
    UnknownUser,
    InvalidCredentials,
}

impl AuthFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthFailure::MissingCredential => "missing_credential",
            AuthFailure::Expired => "expired",
            AuthFailure::Malformed => "malformed",
            AuthFailure::WrongPurpose => "wrong_purpose",
            AuthFailure::UnknownUser => "unknown_user",
            AuthFailure::InvalidCredentials => "invalid_credentials",
        }
    }
}

/// Closed set of failures every layer below the handlers reports.
/// `status_code` is the one place a failure becomes a transport status.
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },

    // 404 Not Found (absent, or owned by another tenant)
    NotFound(String),

    // 404 Not Found (subdomain does not resolve to an active tenant)
    TenantNotFound(String),

    // 401 Unauthorized
    Unauthorized { reason: AuthFailure, message: String },

    // 403 Forbidden
    Forbidden(String),

    // 409 Conflict
    Conflict(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),

    // 500 Internal Server Error; the detail is logged, never returned
    Internal(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::TenantNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::TenantNotFound(_) => "TENANT_NOT_FOUND",
            ApiError::Unauthorized { .. } => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::ValidationError { message, .. } => message,
            ApiError::NotFound(msg) => msg,
            ApiError::TenantNotFound(msg) => msg,
            ApiError::Unauthorized { message, .. } => message,
            ApiError::Forbidden(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
            ApiError::Internal(_) => INTERNAL_MESSAGE,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut error = json!({
            "code": self.error_code(),
            "message": self.message(),
        });

        if let ApiError::ValidationError { field_errors: Some(field_errors), .. } = self {
            error["field_errors"] = json!(field_errors);
        }

        json!({
            "success": false,
            "error": error
        })
    }
}

// Static constructor methods
impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors: None,
        }
    }

    pub fn field(field: &str, problem: impl Into<String>) -> Self {
        let mut field_errors = HashMap::new();
        field_errors.insert(field.to_string(), problem.into());
        ApiError::ValidationError {
            message: "Invalid field value".to_string(),
            field_errors: Some(field_errors),
        }
    }

    pub fn fields(field_errors: HashMap<String, String>) -> Self {
        ApiError::ValidationError {
            message: "Invalid field values".to_string(),
            field_errors: Some(field_errors),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn tenant_not_found(message: impl Into<String>) -> Self {
        ApiError::TenantNotFound(message.into())
    }

    pub fn unauthorized(reason: AuthFailure, message: impl Into<String>) -> Self {
        ApiError::Unauthorized {
            reason,
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        ApiError::Internal(detail.into())
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => ApiError::not_found(msg),
            DatabaseError::UniqueViolation(msg) => {
                tracing::debug!("Unique constraint violated: {}", msg);
                ApiError::conflict("Resource already exists")
            }
            DatabaseError::InvalidInput(msg) => ApiError::validation(msg),
            DatabaseError::ConnectionError(msg) => {
                tracing::error!("Database connection error: {}", msg);
                ApiError::ServiceUnavailable("Database temporarily unavailable".to_string())
            }
            other => ApiError::internal(format!("database: {}", other)),
        }
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        ApiError::internal(format!("filter: {}", err))
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => ApiError::unauthorized(AuthFailure::Expired, "Token has expired"),
            TokenError::Malformed(_) => ApiError::unauthorized(AuthFailure::Malformed, "Invalid token"),
            TokenError::WrongPurpose { .. } => ApiError::unauthorized(AuthFailure::WrongPurpose, "Invalid token"),
            TokenError::Signing(detail) => ApiError::internal(format!("token signing: {}", detail)),
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Internal(detail) => write!(f, "{}", detail),
            _ => write!(f, "{}", self.message()),
        }
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match &self {
            ApiError::Internal(detail) => tracing::error!(detail = %detail, "internal error"),
            ApiError::Unauthorized { reason, message } => {
                tracing::info!(reason = reason.as_str(), "unauthorized: {}", message)
            }
            _ => {}
        }
        (self.status_code(), Json(self.to_json())).into_response()
    }
}
