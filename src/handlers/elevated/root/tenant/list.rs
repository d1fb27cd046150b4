// handlers/elevated/root/tenant/list.rs - GET /api/root/tenants handler

use axum::extract::State;

use crate::database::models::Tenant;
use crate::error::ApiError;
use crate::handlers::ValidQuery;
use crate::middleware::Paged;
use crate::services::tenant_service::ListTenantsQuery;
use crate::services::TenantService;
use crate::state::AppState;

/// `?search=` matches name or subdomain, `?active=true|false` filters status
pub async fn tenant_list(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<ListTenantsQuery>,
) -> Result<Paged<Tenant>, ApiError> {
    Ok(Paged(TenantService::new(&state).list(query).await?))
}
