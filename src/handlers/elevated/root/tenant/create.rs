// handlers/elevated/root/tenant/create.rs - POST /api/root/tenants handler

use axum::extract::State;

use crate::database::models::Tenant;
use crate::handlers::ValidJson;
use crate::middleware::{ApiResponse, ApiResult, Auth};
use crate::services::tenant_service::CreateTenantInput;
use crate::services::TenantService;
use crate::state::AppState;

/// Create a tenant. The subdomain must be well-formed, not reserved and not
/// used by any other tenant, active or not.
///
/// ```json
/// { "name": "Acme Corp", "subdomain": "acme", "primary_color": "#1a2b3c", "logo_url": "https://..." }
/// ```
pub async fn tenant_create(
    State(state): State<AppState>,
    Auth(auth): Auth,
    ValidJson(input): ValidJson<CreateTenantInput>,
) -> ApiResult<Tenant> {
    let tenant = TenantService::new(&state).create(input).await?;
    tracing::info!(admin_id = %auth.user_id, tenant_id = %tenant.id, "tenant created by admin");
    Ok(ApiResponse::created(tenant))
}
