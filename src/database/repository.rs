use std::marker::PhantomData;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::database::entity::Entity;
use crate::database::manager::DatabaseError;
use crate::database::store::Store;
use crate::filter::FilterData;

const DEFAULT_MAX_PAGE_SIZE: i64 = 100;

/// Which tenant an operation runs under. `Unscoped` exists for root
/// entities (tenants) only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantScope {
    Tenant(Uuid),
    Unscoped,
}

#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub order: Option<Value>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl FindOptions {
    pub fn order(order: Value) -> Self {
        Self {
            order: Some(order),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(total: i64, page: i64, page_size: i64) -> Self {
        let total_pages = if total == 0 { 0 } else { (total + page_size - 1) / page_size };
        Self { total, page, page_size, total_pages }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

/// Tenant-scoped data access for one entity kind. Every predicate that
/// reaches the store passes through `scoped_where`.
pub struct Repository<T> {
    store: Arc<dyn Store>,
    max_page_size: i64,
    _phantom: PhantomData<T>,
}

impl<T: Entity> Repository<T> {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            _phantom: PhantomData,
        }
    }

    pub fn max_page_size(mut self, max_page_size: i64) -> Self {
        self.max_page_size = max_page_size.max(1);
        self
    }

    /// The single place tenant scoping is applied. The caller's predicate is
    /// nested under `$and`, so a caller-supplied `tenant_id` key can only
    /// narrow the result, never widen it.
    fn scoped_where(scope: TenantScope, where_clause: Value) -> Result<Value, DatabaseError> {
        let table = &T::TABLE;
        match (scope, table.tenant_column) {
            (TenantScope::Tenant(tenant_id), Some(column)) => {
                let mut scope_predicate = Map::new();
                scope_predicate.insert(column.to_string(), json!(tenant_id));
                let scope_predicate = Value::Object(scope_predicate);

                if is_empty_predicate(&where_clause) {
                    Ok(scope_predicate)
                } else {
                    Ok(json!({ "$and": [scope_predicate, where_clause] }))
                }
            }
            (TenantScope::Unscoped, Some(_)) => Err(DatabaseError::ScopeViolation(format!(
                "{} is tenant-owned and requires a tenant scope",
                table.name
            ))),
            (_, None) => Ok(where_clause),
        }
    }

    pub async fn find_by_id(&self, id: Uuid, scope: TenantScope) -> Result<Option<T>, DatabaseError> {
        self.find_one(json!({ "id": id }), scope).await
    }

    pub async fn find_one(&self, where_clause: Value, scope: TenantScope) -> Result<Option<T>, DatabaseError> {
        let options = FindOptions {
            limit: Some(1),
            ..Default::default()
        };
        Ok(self.find_many(where_clause, scope, options).await?.into_iter().next())
    }

    pub async fn find_many(&self, where_clause: Value, scope: TenantScope, options: FindOptions) -> Result<Vec<T>, DatabaseError> {
        let filter = FilterData {
            where_clause: Some(Self::scoped_where(scope, where_clause)?),
            order: options.order,
            limit: options.limit,
            offset: options.offset,
        };
        let records = self.store.select(&T::TABLE, filter).await?;
        records.into_iter().map(T::from_record).collect()
    }

    pub async fn count(&self, where_clause: Value, scope: TenantScope) -> Result<i64, DatabaseError> {
        let where_clause = Self::scoped_where(scope, where_clause)?;
        self.store.count(&T::TABLE, where_clause).await
    }

    /// Insert a new entity, stamping the scope's tenant onto tenant-owned kinds
    pub async fn create(&self, mut entity: T, scope: TenantScope) -> Result<T, DatabaseError> {
        if T::TABLE.tenant_column.is_some() {
            match scope {
                TenantScope::Tenant(tenant_id) => entity.set_tenant_id(tenant_id),
                TenantScope::Unscoped => {
                    return Err(DatabaseError::ScopeViolation(format!(
                        "{} is tenant-owned and requires a tenant scope",
                        T::TABLE.name
                    )))
                }
            }
        }
        let record = self.store.insert(&T::TABLE, entity.to_record()?).await?;
        T::from_record(record)
    }

    /// Re-read under scope, apply `apply`, and write back. Absent and
    /// cross-tenant rows both fail with NotFound.
    pub async fn update<F>(&self, id: Uuid, scope: TenantScope, apply: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&mut T) + Send,
    {
        let mut entity = self
            .find_by_id(id, scope)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("Record not found".to_string()))?;

        let original_tenant = entity.tenant_id();
        apply(&mut entity);
        if entity.id() != id || entity.tenant_id() != original_tenant {
            return Err(DatabaseError::ScopeViolation(format!(
                "update of {} {} attempted to change its identity or tenant",
                T::TABLE.name,
                id
            )));
        }
        entity.touch(Utc::now());

        let where_clause = Self::scoped_where(scope, json!({ "id": id }))?;
        match self.store.update(&T::TABLE, where_clause, entity.to_record()?).await? {
            Some(record) => T::from_record(record),
            None => Err(DatabaseError::NotFound("Record not found".to_string())),
        }
    }

    pub async fn delete(&self, id: Uuid, scope: TenantScope) -> Result<(), DatabaseError> {
        if self.find_by_id(id, scope).await?.is_none() {
            return Err(DatabaseError::NotFound("Record not found".to_string()));
        }
        let where_clause = Self::scoped_where(scope, json!({ "id": id }))?;
        match self.store.delete(&T::TABLE, where_clause).await? {
            0 => Err(DatabaseError::NotFound("Record not found".to_string())),
            _ => Ok(()),
        }
    }

    /// 1-based pagination. Pages past the end come back empty with accurate
    /// totals; `page_size` is capped at the configured maximum.
    pub async fn find_paginated(
        &self,
        where_clause: Value,
        scope: TenantScope,
        page: i64,
        page_size: i64,
        order: Option<Value>,
    ) -> Result<Page<T>, DatabaseError> {
        if page < 1 {
            return Err(DatabaseError::InvalidInput("page must be at least 1".to_string()));
        }
        if page_size < 1 {
            return Err(DatabaseError::InvalidInput("page_size must be at least 1".to_string()));
        }
        let page_size = page_size.min(self.max_page_size);

        let total = self.count(where_clause.clone(), scope).await?;
        let pagination = Pagination::new(total, page, page_size);

        let data = if page > pagination.total_pages {
            vec![]
        } else {
            let options = FindOptions {
                order,
                limit: Some(page_size),
                offset: Some((page - 1).saturating_mul(page_size)),
            };
            self.find_many(where_clause, scope, options).await?
        };

        Ok(Page { data, pagination })
    }
}

fn is_empty_predicate(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory_store::MemoryStore;
    use crate::database::store::Table;
    use crate::filter::ColumnDef;
    use chrono::{DateTime, Utc};
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Note {
        id: Uuid,
        tenant_id: Uuid,
        body: String,
        updated_at: DateTime<Utc>,
    }

    impl Entity for Note {
        const TABLE: Table = Table {
            name: "notes",
            columns: &[
                ColumnDef::new("id", "uuid"),
                ColumnDef::new("tenant_id", "uuid"),
                ColumnDef::new("body", "text"),
                ColumnDef::new("updated_at", "timestamptz"),
            ],
            unique: &[],
            tenant_column: Some("tenant_id"),
        };

        fn id(&self) -> Uuid {
            self.id
        }

        fn tenant_id(&self) -> Option<Uuid> {
            Some(self.tenant_id)
        }

        fn set_tenant_id(&mut self, tenant_id: Uuid) {
            self.tenant_id = tenant_id;
        }

        fn touch(&mut self, now: DateTime<Utc>) {
            self.updated_at = now;
        }
    }

    fn note(body: &str) -> Note {
        Note {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            body: body.to_string(),
            updated_at: Utc::now(),
        }
    }

    fn repo() -> Repository<Note> {
        Repository::new(Arc::new(MemoryStore::new())).max_page_size(10)
    }

    #[tokio::test]
    async fn create_stamps_tenant() {
        let repo = repo();
        let tenant = Uuid::new_v4();
        let created = repo.create(note("a"), TenantScope::Tenant(tenant)).await.unwrap();
        assert_eq!(created.tenant_id, tenant);
    }

    #[tokio::test]
    async fn other_tenants_rows_are_invisible() {
        let repo = repo();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let created = repo.create(note("secret"), TenantScope::Tenant(a)).await.unwrap();

        assert!(repo.find_by_id(created.id, TenantScope::Tenant(b)).await.unwrap().is_none());
        assert_eq!(repo.count(Value::Null, TenantScope::Tenant(b)).await.unwrap(), 0);

        let err = repo
            .update(created.id, TenantScope::Tenant(b), |n| n.body = "pwned".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound(_)));

        let err = repo.delete(created.id, TenantScope::Tenant(b)).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound(_)));

        let still_there = repo.find_by_id(created.id, TenantScope::Tenant(a)).await.unwrap().unwrap();
        assert_eq!(still_there.body, "secret");
    }

    #[tokio::test]
    async fn caller_tenant_predicate_cannot_widen_scope() {
        let repo = repo();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        repo.create(note("a"), TenantScope::Tenant(a)).await.unwrap();

        let found = repo
            .find_many(json!({ "tenant_id": a }), TenantScope::Tenant(b), FindOptions::default())
            .await
            .unwrap();
        assert!(found.is_empty());

        let found = repo
            .find_many(json!({ "$or": [{ "tenant_id": a }, { "body": "a" }] }), TenantScope::Tenant(b), FindOptions::default())
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn unscoped_access_to_tenant_owned_kind_is_rejected() {
        let repo = repo();
        let err = repo.create(note("a"), TenantScope::Unscoped).await.unwrap_err();
        assert!(matches!(err, DatabaseError::ScopeViolation(_)));
        let err = repo.count(Value::Null, TenantScope::Unscoped).await.unwrap_err();
        assert!(matches!(err, DatabaseError::ScopeViolation(_)));
    }

    #[tokio::test]
    async fn update_cannot_move_rows_between_tenants() {
        let repo = repo();
        let a = Uuid::new_v4();
        let created = repo.create(note("a"), TenantScope::Tenant(a)).await.unwrap();
        let err = repo
            .update(created.id, TenantScope::Tenant(a), |n| n.tenant_id = Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::ScopeViolation(_)));

        let updated = repo
            .update(created.id, TenantScope::Tenant(a), |n| n.body = "b".to_string())
            .await
            .unwrap();
        assert_eq!(updated.body, "b");
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn pagination_math() {
        let repo = repo();
        let a = Uuid::new_v4();
        for i in 0..25 {
            repo.create(note(&format!("{:02}", i)), TenantScope::Tenant(a)).await.unwrap();
        }

        let page = repo
            .find_paginated(Value::Null, TenantScope::Tenant(a), 3, 10, Some(json!("body asc")))
            .await
            .unwrap();
        assert_eq!(page.pagination, Pagination { total: 25, page: 3, page_size: 10, total_pages: 3 });
        assert_eq!(page.data.len(), 5);
        assert_eq!(page.data[0].body, "20");

        let past_end = repo
            .find_paginated(Value::Null, TenantScope::Tenant(a), 7, 10, None)
            .await
            .unwrap();
        assert!(past_end.data.is_empty());
        assert_eq!(past_end.pagination.total, 25);
        assert_eq!(past_end.pagination.total_pages, 3);

        // Capped at the configured maximum
        let capped = repo
            .find_paginated(Value::Null, TenantScope::Tenant(a), 1, 500, None)
            .await
            .unwrap();
        assert_eq!(capped.pagination.page_size, 10);

        let err = repo.find_paginated(Value::Null, TenantScope::Tenant(a), 0, 10, None).await.unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidInput(_)));
    }

    #[test]
    fn total_pages_is_zero_for_empty_sets() {
        assert_eq!(Pagination::new(0, 1, 20).total_pages, 0);
        assert_eq!(Pagination::new(1, 1, 20).total_pages, 1);
        assert_eq!(Pagination::new(40, 1, 20).total_pages, 2);
        assert_eq!(Pagination::new(41, 1, 20).total_pages, 3);
    }
}
