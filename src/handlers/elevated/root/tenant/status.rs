// handlers/elevated/root/tenant/status.rs - tenant activation handlers

use axum::extract::State;
use uuid::Uuid;

use crate::database::models::Tenant;
use crate::error::ApiError;
use crate::handlers::ValidPath;
use crate::middleware::{ApiResponse, ApiResult, Auth};
use crate::services::TenantService;
use crate::state::AppState;

/// POST /api/root/tenants/:id/deactivate
///
/// Requests for the subdomain start answering `TENANT_NOT_FOUND` at once.
/// An admin cannot deactivate the tenant their own account lives in.
pub async fn tenant_deactivate(
    State(state): State<AppState>,
    Auth(auth): Auth,
    ValidPath(id): ValidPath<Uuid>,
) -> ApiResult<Tenant> {
    if id == auth.tenant_id {
        return Err(ApiError::forbidden("You cannot deactivate your own tenant"));
    }
    let tenant = TenantService::new(&state).set_active(id, false).await?;
    tracing::warn!(admin_id = %auth.user_id, tenant_id = %id, "tenant deactivated");
    Ok(ApiResponse::success(tenant))
}

/// POST /api/root/tenants/:id/activate
pub async fn tenant_activate(
    State(state): State<AppState>,
    Auth(auth): Auth,
    ValidPath(id): ValidPath<Uuid>,
) -> ApiResult<Tenant> {
    let tenant = TenantService::new(&state).set_active(id, true).await?;
    tracing::info!(admin_id = %auth.user_id, tenant_id = %id, "tenant activated");
    Ok(ApiResponse::success(tenant))
}
