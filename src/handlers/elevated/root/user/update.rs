use axum::extract::State;
use uuid::Uuid;

use crate::database::models::UserResponse;
use crate::handlers::{ValidJson, ValidPath};
use crate::middleware::{ApiResponse, ApiResult, Auth};
use crate::services::user_service::{SetActiveInput, SetRoleInput};
use crate::services::UserService;
use crate::state::AppState;

/// PATCH /api/root/users/:id/status - `{"active": false}`
pub async fn user_status_patch(
    State(state): State<AppState>,
    Auth(auth): Auth,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(input): ValidJson<SetActiveInput>,
) -> ApiResult<UserResponse> {
    let user = UserService::new(&state)
        .set_active(auth.tenant_id, Some(auth.user_id), id, input.active)
        .await?;
    Ok(ApiResponse::success(user))
}

/// PATCH /api/root/users/:id/role - `{"role": "ADMIN"}`
pub async fn user_role_patch(
    State(state): State<AppState>,
    Auth(auth): Auth,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(input): ValidJson<SetRoleInput>,
) -> ApiResult<UserResponse> {
    let user = UserService::new(&state)
        .set_role(auth.tenant_id, Some(auth.user_id), id, &input.role)
        .await?;
    Ok(ApiResponse::success(user))
}
