// handlers/public/auth/register.rs - POST /auth/register handler

use axum::extract::State;

use crate::handlers::ValidJson;
use crate::middleware::{ApiResponse, ApiResult, TenantContext};
use crate::services::auth_service::{AuthSession, RegisterInput};
use crate::services::AuthService;
use crate::state::AppState;

/// Create a USER account in the resolved tenant and sign it in
pub async fn register_post(
    State(state): State<AppState>,
    context: TenantContext,
    ValidJson(input): ValidJson<RegisterInput>,
) -> ApiResult<AuthSession> {
    let session = AuthService::new(&state).register(&context, input).await?;
    Ok(ApiResponse::created(session))
}
