// handlers/elevated/root/tenant/update.rs - PATCH /api/root/tenants/:id handler

use axum::extract::State;
use uuid::Uuid;

use crate::database::models::Tenant;
use crate::handlers::{ValidJson, ValidPath};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::tenant_service::UpdateTenantInput;
use crate::services::TenantService;
use crate::state::AppState;

/// Name, subdomain, primary color and logo. A new subdomain is validated
/// and checked for uniqueness like on create; `null` clears color or logo.
pub async fn tenant_update(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(input): ValidJson<UpdateTenantInput>,
) -> ApiResult<Tenant> {
    Ok(ApiResponse::success(TenantService::new(&state).update(id, input).await?))
}
