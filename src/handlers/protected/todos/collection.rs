use axum::extract::State;

use crate::database::models::Todo;
use crate::error::ApiError;
use crate::handlers::{ValidJson, ValidQuery};
use crate::middleware::{ApiResponse, ApiResult, Auth, Paged};
use crate::services::todo_service::{CreateTodoInput, ListTodosQuery};
use crate::services::TodoService;
use crate::state::AppState;

/// GET /api/todos - the caller's todos, filtered, sorted and paginated
pub async fn todos_get(
    State(state): State<AppState>,
    Auth(auth): Auth,
    ValidQuery(query): ValidQuery<ListTodosQuery>,
) -> Result<Paged<Todo>, ApiError> {
    let page = TodoService::new(&state).list(&auth, query).await?;
    Ok(Paged(page))
}

/// POST /api/todos
pub async fn todos_post(
    State(state): State<AppState>,
    Auth(auth): Auth,
    ValidJson(input): ValidJson<CreateTodoInput>,
) -> ApiResult<Todo> {
    let todo = TodoService::new(&state).create(&auth, input).await?;
    Ok(ApiResponse::created(todo))
}
