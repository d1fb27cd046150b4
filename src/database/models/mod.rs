pub mod tenant;
pub mod todo;
pub mod user;

pub use tenant::{Tenant, TenantDisplay};
pub use todo::{Todo, TodoPriority, TodoStatus};
pub use user::{Role, User, UserResponse};
