use axum::extract::State;

use crate::database::models::Todo;
use crate::middleware::{ApiResponse, ApiResult, Auth};
use crate::services::todo_service::TodoStats;
use crate::services::TodoService;
use crate::state::AppState;

/// GET /api/todos/upcoming - due within seven days, not completed
pub async fn todos_upcoming(State(state): State<AppState>, Auth(auth): Auth) -> ApiResult<Vec<Todo>> {
    Ok(ApiResponse::success(TodoService::new(&state).upcoming(&auth).await?))
}

/// GET /api/todos/overdue
pub async fn todos_overdue(State(state): State<AppState>, Auth(auth): Auth) -> ApiResult<Vec<Todo>> {
    Ok(ApiResponse::success(TodoService::new(&state).overdue(&auth).await?))
}

/// GET /api/todos/stats
pub async fn todos_stats(State(state): State<AppState>, Auth(auth): Auth) -> ApiResult<TodoStats> {
    Ok(ApiResponse::success(TodoService::new(&state).stats(&auth).await?))
}
