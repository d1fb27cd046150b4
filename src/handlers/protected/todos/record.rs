use axum::extract::State;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::models::Todo;
use crate::handlers::{ValidJson, ValidPath};
use crate::middleware::{ApiResponse, ApiResult, Auth};
use crate::services::todo_service::UpdateTodoInput;
use crate::services::TodoService;
use crate::state::AppState;

/// GET /api/todos/:id
pub async fn todo_get(
    State(state): State<AppState>,
    Auth(auth): Auth,
    ValidPath(id): ValidPath<Uuid>,
) -> ApiResult<Todo> {
    let todo = TodoService::new(&state).get(&auth, id).await?;
    Ok(ApiResponse::success(todo))
}

/// PATCH /api/todos/:id - absent fields are left alone, `null` clears
pub async fn todo_patch(
    State(state): State<AppState>,
    Auth(auth): Auth,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(input): ValidJson<UpdateTodoInput>,
) -> ApiResult<Todo> {
    let todo = TodoService::new(&state).update(&auth, id, input).await?;
    Ok(ApiResponse::success(todo))
}

/// DELETE /api/todos/:id
pub async fn todo_delete(
    State(state): State<AppState>,
    Auth(auth): Auth,
    ValidPath(id): ValidPath<Uuid>,
) -> ApiResult<Value> {
    TodoService::new(&state).delete(&auth, id).await?;
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}
