// handlers/public/auth/password.rs - password reset handlers

use axum::extract::State;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::handlers::ValidJson;
use crate::middleware::{ApiResponse, ApiResult, TenantContext};
use crate::services::auth_service::ForgotPasswordOutcome;
use crate::services::AuthService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// POST /auth/forgot-password - same answer whether or not the account exists
pub async fn forgot_password_post(
    State(state): State<AppState>,
    context: TenantContext,
    ValidJson(body): ValidJson<ForgotPasswordRequest>,
) -> ApiResult<ForgotPasswordOutcome> {
    let outcome = AuthService::new(&state).forgot_password(&context, &body.email).await?;
    Ok(ApiResponse::success(outcome))
}

/// POST /auth/reset-password
pub async fn reset_password_post(
    State(state): State<AppState>,
    context: TenantContext,
    ValidJson(body): ValidJson<ResetPasswordRequest>,
) -> ApiResult<Value> {
    AuthService::new(&state)
        .reset_password(&context, &body.token, &body.new_password)
        .await?;
    Ok(ApiResponse::success(json!({ "message": "Password has been reset" })))
}
