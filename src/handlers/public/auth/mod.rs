// handlers/public/auth/mod.rs - Public authentication handlers
//
// Token acquisition within the resolved tenant.

pub mod login; // POST /auth/login
pub mod password; // POST /auth/forgot-password, /auth/reset-password
pub mod refresh; // POST /auth/refresh
pub mod register; // POST /auth/register

pub use login::login_post;
pub use password::{forgot_password_post, reset_password_post};
pub use refresh::refresh_post;
pub use register::register_post;
