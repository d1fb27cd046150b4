use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::database::Page;
use crate::error::ApiError;

/// Success envelope: `{"success": true, "data": ...}`
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub status_code: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self::with_status(data, StatusCode::OK)
    }

    pub fn with_status(data: T, status_code: StatusCode) -> Self {
        Self { data, status_code }
    }

    /// 201 Created
    pub fn created(data: T) -> Self {
        Self::with_status(data, StatusCode::CREATED)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        match serde_json::to_value(&self.data) {
            Ok(data) => (self.status_code, Json(json!({ "success": true, "data": data }))).into_response(),
            Err(e) => ApiError::internal(format!("failed to serialize response data: {}", e)).into_response(),
        }
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

/// Paginated envelope: `{"success": true, "data": [...], "pagination": {...}}`
#[derive(Debug)]
pub struct Paged<T: Serialize>(pub Page<T>);

impl<T: Serialize> IntoResponse for Paged<T> {
    fn into_response(self) -> Response {
        let Page { data, pagination } = self.0;
        match serde_json::to_value(&data) {
            Ok(data) => Json(json!({ "success": true, "data": data, "pagination": pagination })).into_response(),
            Err(e) => ApiError::internal(format!("failed to serialize response data: {}", e)).into_response(),
        }
    }
}
