// handlers/elevated/root/tenant/show.rs - GET /api/root/tenants/:id handler

use axum::extract::State;
use uuid::Uuid;

use crate::database::models::Tenant;
use crate::handlers::ValidPath;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::TenantService;
use crate::state::AppState;

pub async fn tenant_show(State(state): State<AppState>, ValidPath(id): ValidPath<Uuid>) -> ApiResult<Tenant> {
    Ok(ApiResponse::success(TenantService::new(&state).get(id).await?))
}
