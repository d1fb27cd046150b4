// handlers/elevated/mod.rs - Elevated handlers (ADMIN role required)
//
// Route Prefix: /api/root/*
// Middleware: resolve_tenant → require_auth → require_admin
//             (+ require_main_domain for /api/root/tenants)
//
// Tenant management is global and only served on the main domain; user
// management stays inside the admin's own tenant.

pub mod root;
