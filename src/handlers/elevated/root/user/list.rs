use axum::extract::State;

use crate::database::models::UserResponse;
use crate::error::ApiError;
use crate::handlers::ValidQuery;
use crate::middleware::{Auth, Paged};
use crate::services::user_service::ListUsersQuery;
use crate::services::UserService;
use crate::state::AppState;

/// GET /api/root/users - `?active=` and `?role=` filters
pub async fn user_list(
    State(state): State<AppState>,
    Auth(auth): Auth,
    ValidQuery(query): ValidQuery<ListUsersQuery>,
) -> Result<Paged<UserResponse>, ApiError> {
    Ok(Paged(UserService::new(&state).list(auth.tenant_id, query).await?))
}
