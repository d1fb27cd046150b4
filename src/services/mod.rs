pub mod auth_service;
pub mod tenant_directory;
pub mod tenant_service;
pub mod todo_service;
pub mod user_service;

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};

use crate::config::PaginationConfig;
use crate::error::ApiError;

pub use auth_service::AuthService;
pub use tenant_directory::TenantDirectory;
pub use tenant_service::TenantService;
pub use todo_service::TodoService;
pub use user_service::UserService;

/// Collects per-field validation failures into one `ValidationError`
#[derive(Debug, Default)]
pub(crate) struct FieldErrors(HashMap<String, String>);

impl FieldErrors {
    pub fn check(&mut self, field: &str, result: Result<(), String>) {
        if let Err(problem) = result {
            self.0.entry(field.to_string()).or_insert(problem);
        }
    }

    /// Returns the parsed value, recording the failure under `field`
    pub fn parse<T>(&mut self, field: &str, result: Result<T, String>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(problem) => {
                self.0.entry(field.to_string()).or_insert(problem);
                None
            }
        }
    }

    pub fn finish(self) -> Result<(), ApiError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ApiError::fields(self.0))
        }
    }
}

/// Page query parameters shared by every paginated listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl PageQuery {
    pub fn resolve(&self, config: &PaginationConfig) -> (i64, i64) {
        (self.page.unwrap_or(1), self.page_size.unwrap_or(config.default_page_size))
    }
}

/// RFC 3339 timestamp, or a bare `YYYY-MM-DD` taken as midnight UTC
pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value.trim()) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("'{}' is not a valid date (expected RFC 3339 or YYYY-MM-DD)", value))
}

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`) in PATCH bodies.
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
