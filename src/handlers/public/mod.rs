// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Tenant resolution still applies: registration and login happen inside the
// tenant named by the request's subdomain.
//
// Route Prefix: /auth/* plus GET /api/tenant

pub mod auth;
pub mod tenant;

pub use tenant::current_tenant;
