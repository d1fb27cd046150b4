// handlers/public/auth/login.rs - POST /auth/login handler

use axum::extract::State;

use crate::handlers::ValidJson;
use crate::middleware::{ApiResponse, ApiResult, TenantContext};
use crate::services::auth_service::{AuthSession, LoginInput};
use crate::services::AuthService;
use crate::state::AppState;

/// Exchange email and password for an access/refresh token pair.
///
/// Unknown email, wrong password and deactivated account all answer with the
/// same `401 INVALID_CREDENTIALS`.
pub async fn login_post(
    State(state): State<AppState>,
    context: TenantContext,
    ValidJson(input): ValidJson<LoginInput>,
) -> ApiResult<AuthSession> {
    let session = AuthService::new(&state).login(&context, input).await?;
    Ok(ApiResponse::success(session))
}
