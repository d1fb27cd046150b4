// handlers/elevated/root/tenant/mod.rs - Tenant management handlers
//
// Writes invalidate the tenant directory cache so resolution sees the
// change on the next request.

pub mod create; // POST /api/root/tenants
pub mod list; // GET /api/root/tenants
pub mod show; // GET /api/root/tenants/:id
pub mod stats; // GET /api/root/tenants/:id/stats
pub mod status; // POST /api/root/tenants/:id/deactivate, /activate
pub mod update; // PATCH /api/root/tenants/:id

pub use create::tenant_create;
pub use list::tenant_list;
pub use show::tenant_show;
pub use stats::tenant_stats;
pub use status::{tenant_activate, tenant_deactivate};
pub use update::tenant_update;
