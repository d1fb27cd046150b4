use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::PaginationConfig;
use crate::database::models::tenant::{validate_color, validate_subdomain};
use crate::database::models::{Tenant, Todo, TodoStatus, User};
use crate::database::{DatabaseError, Page, Repository, TenantScope};
use crate::error::ApiError;
use crate::filter::contains_pattern;
use crate::services::{double_option, FieldErrors, PageQuery, TenantDirectory};
use crate::state::AppState;

const NAME_MAX_LEN: usize = 100;

#[derive(Debug, Deserialize)]
pub struct CreateTenantInput {
    pub name: String,
    pub subdomain: String,
    pub primary_color: Option<String>,
    pub logo_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTenantInput {
    pub name: Option<String>,
    pub subdomain: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub primary_color: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub logo_url: Option<Option<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListTenantsQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub search: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TenantStats {
    pub tenant_id: Uuid,
    pub users: i64,
    pub active_users: i64,
    pub todos: i64,
    pub completed_todos: i64,
}

fn validate_tenant_name(name: &str) -> Result<String, String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Name is required".to_string());
    }
    if name.chars().count() > NAME_MAX_LEN {
        return Err(format!("Name must be at most {} characters", NAME_MAX_LEN));
    }
    Ok(name.to_string())
}

fn normalize_subdomain(subdomain: &str) -> Result<String, String> {
    let subdomain = subdomain.trim().to_ascii_lowercase();
    validate_subdomain(&subdomain)?;
    Ok(subdomain)
}

fn normalize_color(color: &str) -> Result<String, String> {
    let color = color.trim().to_ascii_lowercase();
    validate_color(&color)?;
    Ok(color)
}

fn validate_logo_url(logo_url: &str) -> Result<String, String> {
    match url::Url::parse(logo_url.trim()) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(parsed.to_string()),
        _ => Err("Logo URL must be an absolute http(s) URL".to_string()),
    }
}

/// Tenant administration. Tenants are global rows, so every query here is
/// `Unscoped`; counts of tenant-owned rows use that tenant's scope.
pub struct TenantService {
    tenants: Repository<Tenant>,
    users: Repository<User>,
    todos: Repository<Todo>,
    directory: Arc<TenantDirectory>,
    pagination: PaginationConfig,
}

impl TenantService {
    pub fn new(state: &AppState) -> Self {
        Self {
            tenants: state.repository(),
            users: state.repository(),
            todos: state.repository(),
            directory: state.tenants.clone(),
            pagination: state.config.pagination.clone(),
        }
    }

    pub async fn create(&self, input: CreateTenantInput) -> Result<Tenant, ApiError> {
        let mut errors = FieldErrors::default();
        let name = errors.parse("name", validate_tenant_name(&input.name));
        let subdomain = errors.parse("subdomain", normalize_subdomain(&input.subdomain));
        let primary_color = input
            .primary_color
            .as_deref()
            .and_then(|c| errors.parse("primary_color", normalize_color(c)));
        let logo_url = input
            .logo_url
            .as_deref()
            .and_then(|u| errors.parse("logo_url", validate_logo_url(u)));
        errors.finish()?;

        let (Some(name), Some(subdomain)) = (name, subdomain) else {
            return Err(ApiError::internal("tenant fields missing after validation"));
        };
        self.ensure_subdomain_free(&subdomain, None).await?;

        let mut tenant = Tenant::new(name, subdomain);
        tenant.primary_color = primary_color;
        tenant.logo_url = logo_url;

        let tenant = self
            .tenants
            .create(tenant, TenantScope::Unscoped)
            .await
            .map_err(subdomain_conflict)?;
        self.directory.invalidate(&tenant.subdomain).await;
        tracing::info!(tenant_id = %tenant.id, subdomain = %tenant.subdomain, "tenant created");
        Ok(tenant)
    }

    pub async fn list(&self, query: ListTenantsQuery) -> Result<Page<Tenant>, ApiError> {
        let mut clauses: Vec<Value> = Vec::new();
        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = contains_pattern(search);
            clauses.push(json!({ "$or": [
                { "name": { "$ilike": pattern } },
                { "subdomain": { "$ilike": pattern } }
            ] }));
        }
        if let Some(active) = query.active {
            clauses.push(json!({ "active": active }));
        }
        let where_clause = if clauses.is_empty() { json!({}) } else { json!({ "$and": clauses }) };

        let (page, page_size) = PageQuery { page: query.page, page_size: query.page_size }.resolve(&self.pagination);
        Ok(self
            .tenants
            .find_paginated(where_clause, TenantScope::Unscoped, page, page_size, Some(json!("created_at desc, id asc")))
            .await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<Tenant, ApiError> {
        self.tenants
            .find_by_id(id, TenantScope::Unscoped)
            .await?
            .ok_or_else(|| ApiError::not_found("Tenant not found"))
    }

    pub async fn find_by_subdomain(&self, subdomain: &str) -> Result<Tenant, ApiError> {
        self.tenants
            .find_one(json!({ "subdomain": subdomain.trim().to_ascii_lowercase() }), TenantScope::Unscoped)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Tenant '{}' not found", subdomain)))
    }

    pub async fn update(&self, id: Uuid, input: UpdateTenantInput) -> Result<Tenant, ApiError> {
        let mut errors = FieldErrors::default();
        let name = input.name.as_deref().and_then(|n| errors.parse("name", validate_tenant_name(n)));
        let subdomain = input
            .subdomain
            .as_deref()
            .and_then(|s| errors.parse("subdomain", normalize_subdomain(s)));
        let primary_color = match input.primary_color {
            Some(Some(c)) => errors.parse("primary_color", normalize_color(&c)).map(Some),
            Some(None) => Some(None),
            None => None,
        };
        let logo_url = match input.logo_url {
            Some(Some(u)) => errors.parse("logo_url", validate_logo_url(&u)).map(Some),
            Some(None) => Some(None),
            None => None,
        };
        errors.finish()?;

        let existing = self.get(id).await?;
        if let Some(subdomain) = subdomain.as_deref() {
            self.ensure_subdomain_free(subdomain, Some(id)).await?;
        }

        let tenant = self
            .tenants
            .update(id, TenantScope::Unscoped, move |tenant| {
                if let Some(name) = name {
                    tenant.name = name;
                }
                if let Some(subdomain) = subdomain {
                    tenant.subdomain = subdomain;
                }
                if let Some(primary_color) = primary_color {
                    tenant.primary_color = primary_color;
                }
                if let Some(logo_url) = logo_url {
                    tenant.logo_url = logo_url;
                }
            })
            .await
            .map_err(subdomain_conflict)?;

        self.directory.invalidate(&existing.subdomain).await;
        self.directory.invalidate(&tenant.subdomain).await;
        tracing::info!(tenant_id = %id, subdomain = %tenant.subdomain, "tenant updated");
        Ok(tenant)
    }

    pub async fn set_active(&self, id: Uuid, active: bool) -> Result<Tenant, ApiError> {
        let tenant = self
            .tenants
            .update(id, TenantScope::Unscoped, move |tenant| tenant.active = active)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound(_) => ApiError::not_found("Tenant not found"),
                other => other.into(),
            })?;
        self.directory.invalidate(&tenant.subdomain).await;
        tracing::info!(tenant_id = %id, active, "tenant status changed");
        Ok(tenant)
    }

    pub async fn stats(&self, id: Uuid) -> Result<TenantStats, ApiError> {
        let tenant = self.get(id).await?;
        let scope = TenantScope::Tenant(tenant.id);
        Ok(TenantStats {
            tenant_id: tenant.id,
            users: self.users.count(json!({}), scope).await?,
            active_users: self.users.count(json!({ "active": true }), scope).await?,
            todos: self.todos.count(json!({}), scope).await?,
            completed_todos: self
                .todos
                .count(json!({ "status": TodoStatus::Completed.as_str() }), scope)
                .await?,
        })
    }

    /// Subdomains are unique across all tenants, active or not
    async fn ensure_subdomain_free(&self, subdomain: &str, except: Option<Uuid>) -> Result<(), ApiError> {
        let taken = self
            .tenants
            .find_one(json!({ "subdomain": subdomain }), TenantScope::Unscoped)
            .await?
            .is_some_and(|t| Some(t.id) != except);
        if taken {
            return Err(ApiError::conflict(format!("Subdomain '{}' is already taken", subdomain)));
        }
        Ok(())
    }
}

fn subdomain_conflict(err: DatabaseError) -> ApiError {
    match err {
        DatabaseError::UniqueViolation(_) => ApiError::conflict("Subdomain is already taken"),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::{MemoryStore, Store};
    use chrono::Utc;

    fn state() -> AppState {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        AppState::new(AppConfig::in_memory(), store).unwrap()
    }

    fn input(name: &str, subdomain: &str) -> CreateTenantInput {
        CreateTenantInput { name: name.into(), subdomain: subdomain.into(), primary_color: None, logo_url: None }
    }

    #[tokio::test]
    async fn create_normalizes_and_rejects_duplicates() {
        let state = state();
        let service = TenantService::new(&state);
        let tenant = service
            .create(CreateTenantInput {
                primary_color: Some("#1A2B3C".into()),
                logo_url: Some("https://cdn.example.com/logo.png".into()),
                ..input(" Acme Corp ", "Acme")
            })
            .await
            .unwrap();
        assert_eq!(tenant.name, "Acme Corp");
        assert_eq!(tenant.subdomain, "acme");
        assert_eq!(tenant.primary_color.as_deref(), Some("#1a2b3c"));
        assert!(tenant.active);

        let err = service.create(input("Again", "acme")).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn create_reports_every_bad_field() {
        let state = state();
        let input = CreateTenantInput {
            name: "".into(),
            subdomain: "www".into(),
            primary_color: Some("red".into()),
            logo_url: Some("ftp://example.com/logo".into()),
        };
        match TenantService::new(&state).create(input).await.unwrap_err() {
            ApiError::ValidationError { field_errors: Some(fields), .. } => {
                assert_eq!(fields.len(), 4);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn update_rechecks_subdomain_and_refreshes_cache() {
        let state = state();
        let service = TenantService::new(&state);
        let acme = service.create(input("Acme", "acme")).await.unwrap();
        service.create(input("Other", "other")).await.unwrap();

        // Warm the cache under the old subdomain
        assert!(state.tenants.find_active_by_subdomain("acme").await.unwrap().is_some());

        let taken = UpdateTenantInput { subdomain: Some("other".into()), ..Default::default() };
        assert!(matches!(service.update(acme.id, taken).await.unwrap_err(), ApiError::Conflict(_)));

        // Keeping its own subdomain is not a conflict
        let same = UpdateTenantInput { subdomain: Some("acme".into()), name: Some("Acme Inc".into()), ..Default::default() };
        assert_eq!(service.update(acme.id, same).await.unwrap().name, "Acme Inc");

        let renamed = UpdateTenantInput { subdomain: Some("acme-two".into()), ..Default::default() };
        service.update(acme.id, renamed).await.unwrap();
        assert!(state.tenants.find_active_by_subdomain("acme").await.unwrap().is_none());
        assert_eq!(state.tenants.find_active_by_subdomain("acme-two").await.unwrap().map(|t| t.id), Some(acme.id));
    }

    #[tokio::test]
    async fn deactivation_hides_tenant_from_resolution() {
        let state = state();
        let service = TenantService::new(&state);
        let acme = service.create(input("Acme", "acme")).await.unwrap();
        assert!(state.tenants.find_active_by_subdomain("acme").await.unwrap().is_some());

        assert!(!service.set_active(acme.id, false).await.unwrap().active);
        assert!(state.tenants.find_active_by_subdomain("acme").await.unwrap().is_none());

        service.set_active(acme.id, true).await.unwrap();
        assert!(state.tenants.find_active_by_subdomain("acme").await.unwrap().is_some());

        assert!(matches!(service.set_active(Uuid::new_v4(), true).await.unwrap_err(), ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_searches_and_filters() {
        let state = state();
        let service = TenantService::new(&state);
        service.create(input("Acme", "acme")).await.unwrap();
        let beta = service.create(input("Beta Labs", "beta")).await.unwrap();
        service.create(input("Acme West", "acme-west")).await.unwrap();
        service.set_active(beta.id, false).await.unwrap();

        let query = ListTenantsQuery { search: Some("ACME".into()), ..Default::default() };
        assert_eq!(service.list(query).await.unwrap().pagination.total, 2);

        // Wildcards in the search text match only themselves
        for text in ["%", "_", "acme_west"] {
            let query = ListTenantsQuery { search: Some(text.into()), ..Default::default() };
            assert_eq!(service.list(query).await.unwrap().pagination.total, 0, "{}", text);
        }

        let query = ListTenantsQuery { active: Some(false), ..Default::default() };
        let page = service.list(query).await.unwrap();
        assert_eq!(page.data.iter().map(|t| t.id).collect::<Vec<_>>(), vec![beta.id]);
    }

    #[tokio::test]
    async fn stats_count_only_that_tenant() {
        let state = state();
        let service = TenantService::new(&state);
        let acme = service.create(input("Acme", "acme")).await.unwrap();
        let other = service.create(input("Other", "other")).await.unwrap();

        let users = state.repository::<User>();
        let todos = state.repository::<Todo>();
        let owner = users
            .create(User::new("a@x.com", "hash".into(), "A", crate::database::models::Role::User), TenantScope::Tenant(acme.id))
            .await
            .unwrap();
        users
            .create(User::new("b@x.com", "hash".into(), "B", crate::database::models::Role::User), TenantScope::Tenant(other.id))
            .await
            .unwrap();
        let mut done = Todo::new("done".into(), owner.id);
        done.set_status(TodoStatus::Completed, Utc::now());
        todos.create(done, TenantScope::Tenant(acme.id)).await.unwrap();
        todos.create(Todo::new("open".into(), owner.id), TenantScope::Tenant(acme.id)).await.unwrap();

        let stats = service.stats(acme.id).await.unwrap();
        assert_eq!(
            stats,
            TenantStats { tenant_id: acme.id, users: 1, active_users: 1, todos: 2, completed_todos: 1 }
        );
    }
}
