use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::config::PaginationConfig;
use crate::database::models::user::normalize_email;
use crate::database::models::{Role, User, UserResponse};
use crate::database::{DatabaseError, Page, Repository, TenantScope};
use crate::error::ApiError;
use crate::services::PageQuery;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub active: Option<bool>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveInput {
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetRoleInput {
    pub role: String,
}

/// User administration inside one tenant. `actor` is the admin performing
/// the change, or `None` for the operator CLI.
pub struct UserService {
    users: Repository<User>,
    pagination: PaginationConfig,
}

impl UserService {
    pub fn new(state: &AppState) -> Self {
        Self {
            users: state.repository(),
            pagination: state.config.pagination.clone(),
        }
    }

    pub async fn list(&self, tenant_id: Uuid, query: ListUsersQuery) -> Result<Page<UserResponse>, ApiError> {
        let mut where_clause = serde_json::Map::new();
        if let Some(active) = query.active {
            where_clause.insert("active".into(), json!(active));
        }
        if let Some(role) = query.role.as_deref() {
            let role = role.parse::<Role>().map_err(|problem| ApiError::field("role", problem))?;
            where_clause.insert("role".into(), json!(role.as_str()));
        }

        let (page, page_size) = PageQuery { page: query.page, page_size: query.page_size }.resolve(&self.pagination);
        let page = self
            .users
            .find_paginated(
                where_clause.into(),
                TenantScope::Tenant(tenant_id),
                page,
                page_size,
                Some(json!("created_at asc, id asc")),
            )
            .await?;
        Ok(page.map(UserResponse::from))
    }

    pub async fn set_active(
        &self,
        tenant_id: Uuid,
        actor: Option<Uuid>,
        user_id: Uuid,
        active: bool,
    ) -> Result<UserResponse, ApiError> {
        if !active && actor == Some(user_id) {
            return Err(ApiError::forbidden("You cannot deactivate your own account"));
        }
        let user = self
            .users
            .update(user_id, TenantScope::Tenant(tenant_id), move |user| user.active = active)
            .await
            .map_err(user_not_found)?;
        tracing::info!(%tenant_id, user_id = %user.id, active, "user status changed");
        Ok(user.into())
    }

    pub async fn set_role(
        &self,
        tenant_id: Uuid,
        actor: Option<Uuid>,
        user_id: Uuid,
        role: &str,
    ) -> Result<UserResponse, ApiError> {
        let role = role.parse::<Role>().map_err(|problem| ApiError::field("role", problem))?;
        if role != Role::Admin && actor == Some(user_id) {
            return Err(ApiError::forbidden("You cannot remove your own admin role"));
        }
        let user = self
            .users
            .update(user_id, TenantScope::Tenant(tenant_id), move |user| user.role = role)
            .await
            .map_err(user_not_found)?;
        tracing::info!(%tenant_id, user_id = %user.id, role = %user.role, "user role changed");
        Ok(user.into())
    }

    /// Operator path: grant ADMIN by email within a tenant
    pub async fn promote_by_email(&self, tenant_id: Uuid, email: &str) -> Result<UserResponse, ApiError> {
        let user = self
            .users
            .find_one(json!({ "email": normalize_email(email) }), TenantScope::Tenant(tenant_id))
            .await?
            .ok_or_else(|| ApiError::not_found(format!("No user '{}' in this tenant", email)))?;
        self.set_role(tenant_id, None, user.id, Role::Admin.as_str()).await
    }
}

fn user_not_found(err: DatabaseError) -> ApiError {
    match err {
        DatabaseError::NotFound(_) => ApiError::not_found("User not found"),
        other => other.into(),
    }
}
