// handlers/elevated/root/user/mod.rs - User management inside the admin's tenant

pub mod list; // GET /api/root/users
pub mod update; // PATCH /api/root/users/:id/status, /role

pub use list::user_list;
pub use update::{user_role_patch, user_status_patch};
