// handlers/protected/mod.rs - Protected handlers (access token required)
//
// Route Prefix: /api/*
// Middleware: resolve_tenant → require_auth (token tenant must match host tenant)

pub mod auth; // /api/auth/*
pub mod todos; // /api/todos/*
