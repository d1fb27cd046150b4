// handlers/protected/auth/mod.rs - Account self-service for the signed-in user

use axum::extract::State;
use serde_json::{json, Value};

use crate::database::models::UserResponse;
use crate::handlers::ValidJson;
use crate::middleware::{ApiResponse, ApiResult, Auth};
use crate::services::auth_service::{ChangePasswordInput, UpdateProfileInput};
use crate::services::AuthService;
use crate::state::AppState;

/// GET /api/auth/me
pub async fn me_get(State(state): State<AppState>, Auth(auth): Auth) -> ApiResult<UserResponse> {
    let user = AuthService::new(&state).profile(&auth).await?;
    Ok(ApiResponse::success(user))
}

/// PATCH /api/auth/me - name and email; email stays unique within the tenant
pub async fn me_patch(
    State(state): State<AppState>,
    Auth(auth): Auth,
    ValidJson(input): ValidJson<UpdateProfileInput>,
) -> ApiResult<UserResponse> {
    let user = AuthService::new(&state).update_profile(&auth, input).await?;
    Ok(ApiResponse::success(user))
}

/// PUT /api/auth/password
pub async fn password_put(
    State(state): State<AppState>,
    Auth(auth): Auth,
    ValidJson(input): ValidJson<ChangePasswordInput>,
) -> ApiResult<Value> {
    AuthService::new(&state).change_password(&auth, input).await?;
    Ok(ApiResponse::success(json!({ "message": "Password updated" })))
}
