// handlers/public/auth/refresh.rs - POST /auth/refresh handler

use axum::extract::State;
use serde::Deserialize;

use crate::handlers::ValidJson;
use crate::middleware::{ApiResponse, ApiResult, TenantContext};
use crate::services::auth_service::AuthSession;
use crate::services::AuthService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh_post(
    State(state): State<AppState>,
    context: TenantContext,
    ValidJson(body): ValidJson<RefreshRequest>,
) -> ApiResult<AuthSession> {
    let session = AuthService::new(&state).refresh(&context, &body.refresh_token).await?;
    Ok(ApiResponse::success(session))
}
