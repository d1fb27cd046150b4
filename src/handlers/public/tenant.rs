// handlers/public/tenant.rs - GET /api/tenant handler

use serde::Serialize;

use crate::database::models::TenantDisplay;
use crate::middleware::{ApiResponse, ApiResult, MaybeAuth, TenantContext};

#[derive(Debug, Serialize)]
pub struct CurrentTenant {
    #[serde(flatten)]
    pub tenant: TenantDisplay,
    /// True when the request carried a valid session for this tenant
    pub signed_in: bool,
}

/// Display attributes of the tenant resolved from the host. Anonymous
/// callers get the same branding.
pub async fn current_tenant(context: TenantContext, MaybeAuth(auth): MaybeAuth) -> ApiResult<CurrentTenant> {
    let tenant = context.require_tenant()?;
    Ok(ApiResponse::success(CurrentTenant {
        tenant: tenant.display(),
        signed_in: auth.is_some(),
    }))
}
