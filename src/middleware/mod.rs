pub mod auth;
pub mod response;
pub mod tenant;

pub use auth::{
    optional_auth_middleware, require_admin_middleware, require_auth_middleware, require_role, AccessGuard, Auth,
    AuthContext, MaybeAuth,
};
pub use response::{ApiResponse, ApiResult, Paged};
pub use tenant::{require_main_domain_middleware, resolve_tenant_middleware, TenantContext, TenantResolver};
