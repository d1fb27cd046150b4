// handlers/elevated/root/tenant/stats.rs - GET /api/root/tenants/:id/stats handler

use axum::extract::State;
use uuid::Uuid;

use crate::handlers::ValidPath;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::tenant_service::TenantStats;
use crate::services::TenantService;
use crate::state::AppState;

/// User and todo counts for one tenant
pub async fn tenant_stats(State(state): State<AppState>, ValidPath(id): ValidPath<Uuid>) -> ApiResult<TenantStats> {
    Ok(ApiResponse::success(TenantService::new(&state).stats(id).await?))
}
