// handlers/protected/todos/mod.rs - To-do handlers
//
// All reads and writes go through TodoService, which scopes to the caller's
// tenant and rejects todos owned by other users.

pub mod collection; // GET/POST /api/todos
pub mod record; // GET/PATCH/DELETE /api/todos/:id
pub mod views; // GET /api/todos/upcoming, /overdue, /stats

pub use collection::{todos_get, todos_post};
pub use record::{todo_delete, todo_get, todo_patch};
pub use views::{todos_overdue, todos_stats, todos_upcoming};
