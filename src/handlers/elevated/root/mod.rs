// handlers/elevated/root/mod.rs - Root administrative handlers

pub mod tenant; // /api/root/tenants/*
pub mod user; // /api/root/users/*
