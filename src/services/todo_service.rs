use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::PaginationConfig;
use crate::database::models::todo::{DESCRIPTION_MAX_LEN, TITLE_MAX_LEN};
use crate::database::models::{Todo, TodoPriority, TodoStatus};
use crate::database::{FindOptions, Page, Repository};
use crate::error::ApiError;
use crate::filter::contains_pattern;
use crate::middleware::AuthContext;
use crate::services::{double_option, parse_timestamp, FieldErrors, PageQuery};
use crate::state::AppState;

const UPCOMING_WINDOW_DAYS: i64 = 7;
const SORT_FIELDS: &[&str] = &["created_at", "updated_at", "due_date", "title", "status"];

#[derive(Debug, Deserialize)]
pub struct CreateTodoInput {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<String>,
    pub list_id: Option<String>,
}

/// PATCH body; `Some(None)` clears a nullable field
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTodoInput {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub status: Option<String>,
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub list_id: Option<Option<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListTodosQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    /// One status or a comma-separated set
    pub status: Option<String>,
    pub priority: Option<String>,
    pub list_id: Option<String>,
    pub search: Option<String>,
    pub due_before: Option<String>,
    pub due_after: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TodoStats {
    pub total: i64,
    pub pending: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub cancelled: i64,
    pub overdue: i64,
    pub high_priority: i64,
    /// Percentage of todos completed, two decimals; 0 when there are none
    pub completion_rate: f64,
}

/// Validated field values shared by create and update
#[derive(Default)]
struct TodoChanges {
    title: Option<String>,
    description: Option<Option<String>>,
    status: Option<TodoStatus>,
    priority: Option<TodoPriority>,
    due_date: Option<Option<DateTime<Utc>>>,
    list_id: Option<Option<Uuid>>,
}

impl TodoChanges {
    fn apply(self, todo: &mut Todo, now: DateTime<Utc>) {
        if let Some(title) = self.title {
            todo.title = title;
        }
        if let Some(description) = self.description {
            todo.description = description;
        }
        if let Some(status) = self.status {
            todo.set_status(status, now);
        }
        if let Some(priority) = self.priority {
            todo.priority = priority;
        }
        if let Some(due_date) = self.due_date {
            todo.due_date = due_date;
        }
        if let Some(list_id) = self.list_id {
            todo.list_id = list_id;
        }
    }
}

fn validate_title(title: &str) -> Result<String, String> {
    let title = title.trim();
    if title.is_empty() {
        return Err("Title is required".to_string());
    }
    if title.chars().count() > TITLE_MAX_LEN {
        return Err(format!("Title must be at most {} characters", TITLE_MAX_LEN));
    }
    Ok(title.to_string())
}

fn validate_description(description: Option<String>) -> Result<Option<String>, String> {
    match description {
        Some(d) if d.chars().count() > DESCRIPTION_MAX_LEN => {
            Err(format!("Description must be at most {} characters", DESCRIPTION_MAX_LEN))
        }
        other => Ok(other),
    }
}

fn parse_uuid(value: &str) -> Result<Uuid, String> {
    Uuid::parse_str(value.trim()).map_err(|_| format!("'{}' is not a valid id", value))
}

/// `PENDING,IN_PROGRESS` -> `{"$in": [...]}`, a single value -> equality
fn enum_filter<T, F>(raw: &str, parse: F, as_str: fn(&T) -> &'static str) -> Result<Value, String>
where
    F: Fn(&str) -> Result<T, String>,
{
    let values = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse(s).map(|v| as_str(&v)))
        .collect::<Result<Vec<_>, _>>()?;
    match values.as_slice() {
        [] => Err("At least one value is required".to_string()),
        [single] => Ok(json!(single)),
        many => Ok(json!({ "$in": many })),
    }
}

/// Todo CRUD and views for the authenticated user. Rows are tenant-scoped
/// by the repository and owner-checked here.
pub struct TodoService {
    todos: Repository<Todo>,
    pagination: PaginationConfig,
}

impl TodoService {
    pub fn new(state: &AppState) -> Self {
        Self {
            todos: state.repository(),
            pagination: state.config.pagination.clone(),
        }
    }

    pub async fn create(&self, auth: &AuthContext, input: CreateTodoInput) -> Result<Todo, ApiError> {
        let mut errors = FieldErrors::default();
        let title = errors.parse("title", validate_title(&input.title));
        let description = errors.parse("description", validate_description(input.description));
        let status = input.status.as_deref().and_then(|s| errors.parse("status", s.parse::<TodoStatus>()));
        let priority = input.priority.as_deref().and_then(|p| errors.parse("priority", p.parse::<TodoPriority>()));
        let due_date = input.due_date.as_deref().and_then(|d| errors.parse("due_date", parse_timestamp(d)));
        let list_id = input.list_id.as_deref().and_then(|l| errors.parse("list_id", parse_uuid(l)));
        errors.finish()?;

        let now = Utc::now();
        let mut todo = Todo::new(String::new(), auth.user_id);
        TodoChanges {
            title,
            description,
            status,
            priority,
            due_date: Some(due_date),
            list_id: Some(list_id),
        }
        .apply(&mut todo, now);

        let todo = self.todos.create(todo, auth.scope()).await?;
        tracing::debug!(todo_id = %todo.id, user_id = %auth.user_id, tenant_id = %auth.tenant_id, "todo created");
        Ok(todo)
    }

    /// Tenant scope first (cross-tenant rows are NotFound), then ownership
    pub async fn get(&self, auth: &AuthContext, id: Uuid) -> Result<Todo, ApiError> {
        let todo = self
            .todos
            .find_by_id(id, auth.scope())
            .await?
            .ok_or_else(|| ApiError::not_found("Todo not found"))?;
        if todo.user_id != auth.user_id {
            tracing::info!(todo_id = %id, user_id = %auth.user_id, "todo owned by another user");
            return Err(ApiError::forbidden("You do not have access to this todo"));
        }
        Ok(todo)
    }

    pub async fn update(&self, auth: &AuthContext, id: Uuid, input: UpdateTodoInput) -> Result<Todo, ApiError> {
        let mut errors = FieldErrors::default();
        let changes = TodoChanges {
            title: input.title.as_deref().and_then(|t| errors.parse("title", validate_title(t))),
            description: input.description.and_then(|d| errors.parse("description", validate_description(d))),
            status: input.status.as_deref().and_then(|s| errors.parse("status", s.parse::<TodoStatus>())),
            priority: input.priority.as_deref().and_then(|p| errors.parse("priority", p.parse::<TodoPriority>())),
            due_date: match input.due_date {
                Some(Some(d)) => errors.parse("due_date", parse_timestamp(&d)).map(Some),
                Some(None) => Some(None),
                None => None,
            },
            list_id: match input.list_id {
                Some(Some(l)) => errors.parse("list_id", parse_uuid(&l)).map(Some),
                Some(None) => Some(None),
                None => None,
            },
        };
        errors.finish()?;

        self.get(auth, id).await?;
        let now = Utc::now();
        let todo = self
            .todos
            .update(id, auth.scope(), move |todo| changes.apply(todo, now))
            .await
            .map_err(|e| not_found_as_todo(e.into()))?;
        Ok(todo)
    }

    pub async fn delete(&self, auth: &AuthContext, id: Uuid) -> Result<(), ApiError> {
        self.get(auth, id).await?;
        self.todos
            .delete(id, auth.scope())
            .await
            .map_err(|e| not_found_as_todo(e.into()))?;
        tracing::debug!(todo_id = %id, user_id = %auth.user_id, "todo deleted");
        Ok(())
    }

    pub async fn list(&self, auth: &AuthContext, query: ListTodosQuery) -> Result<Page<Todo>, ApiError> {
        let mut errors = FieldErrors::default();
        let mut clauses = vec![json!({ "user_id": auth.user_id })];

        if let Some(status) = query.status.as_deref() {
            if let Some(filter) = errors.parse("status", enum_filter(status, str::parse::<TodoStatus>, TodoStatus::as_str)) {
                clauses.push(json!({ "status": filter }));
            }
        }
        if let Some(priority) = query.priority.as_deref() {
            if let Some(filter) =
                errors.parse("priority", enum_filter(priority, str::parse::<TodoPriority>, TodoPriority::as_str))
            {
                clauses.push(json!({ "priority": filter }));
            }
        }
        if let Some(list_id) = query.list_id.as_deref() {
            if let Some(list_id) = errors.parse("list_id", parse_uuid(list_id)) {
                clauses.push(json!({ "list_id": list_id }));
            }
        }
        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = contains_pattern(search);
            clauses.push(json!({ "$or": [
                { "title": { "$ilike": pattern } },
                { "description": { "$ilike": pattern } }
            ] }));
        }
        if let Some(before) = query.due_before.as_deref() {
            if let Some(before) = errors.parse("due_before", parse_timestamp(before)) {
                clauses.push(json!({ "due_date": { "$lt": before } }));
            }
        }
        if let Some(after) = query.due_after.as_deref() {
            if let Some(after) = errors.parse("due_after", parse_timestamp(after)) {
                clauses.push(json!({ "due_date": { "$gte": after } }));
            }
        }

        let sort_by = query.sort_by.as_deref().unwrap_or("created_at");
        if !SORT_FIELDS.contains(&sort_by) {
            errors.check("sort_by", Err(format!("sort_by must be one of {}", SORT_FIELDS.join(", "))));
        }
        let sort_order = match query.sort_order.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("desc") => "desc",
            Some("asc") => "asc",
            Some(_) => {
                errors.check("sort_order", Err("sort_order must be asc or desc".to_string()));
                "desc"
            }
        };
        errors.finish()?;

        let (page, page_size) = PageQuery { page: query.page, page_size: query.page_size }.resolve(&self.pagination);
        let order = json!(format!("{} {}, id asc", sort_by, sort_order));
        Ok(self
            .todos
            .find_paginated(json!({ "$and": clauses }), auth.scope(), page, page_size, Some(order))
            .await?)
    }

    /// Due within the next seven days and not completed, soonest first
    pub async fn upcoming(&self, auth: &AuthContext) -> Result<Vec<Todo>, ApiError> {
        self.upcoming_at(auth, Utc::now()).await
    }

    pub async fn overdue(&self, auth: &AuthContext) -> Result<Vec<Todo>, ApiError> {
        self.overdue_at(auth, Utc::now()).await
    }

    pub async fn stats(&self, auth: &AuthContext) -> Result<TodoStats, ApiError> {
        self.stats_at(auth, Utc::now()).await
    }

    async fn upcoming_at(&self, auth: &AuthContext, now: DateTime<Utc>) -> Result<Vec<Todo>, ApiError> {
        let until = now + Duration::days(UPCOMING_WINDOW_DAYS);
        let where_clause = json!({
            "user_id": auth.user_id,
            "status": { "$ne": TodoStatus::Completed.as_str() },
            "due_date": { "$gte": now, "$lte": until }
        });
        Ok(self
            .todos
            .find_many(where_clause, auth.scope(), FindOptions::order(json!("due_date asc, id asc")))
            .await?)
    }

    async fn overdue_at(&self, auth: &AuthContext, now: DateTime<Utc>) -> Result<Vec<Todo>, ApiError> {
        Ok(self
            .todos
            .find_many(Self::overdue_where(auth, now), auth.scope(), FindOptions::order(json!("due_date asc, id asc")))
            .await?)
    }

    async fn stats_at(&self, auth: &AuthContext, now: DateTime<Utc>) -> Result<TodoStats, ApiError> {
        let owner = json!({ "user_id": auth.user_id });
        let count = |extra: Value| {
            let where_clause = json!({ "$and": [owner.clone(), extra] });
            self.todos.count(where_clause, auth.scope())
        };

        let total = count(json!({})).await?;
        let pending = count(json!({ "status": TodoStatus::Pending.as_str() })).await?;
        let in_progress = count(json!({ "status": TodoStatus::InProgress.as_str() })).await?;
        let completed = count(json!({ "status": TodoStatus::Completed.as_str() })).await?;
        let cancelled = count(json!({ "status": TodoStatus::Cancelled.as_str() })).await?;
        let overdue = self.todos.count(Self::overdue_where(auth, now), auth.scope()).await?;
        let high_priority = count(json!({
            "priority": { "$in": [TodoPriority::High.as_str(), TodoPriority::Urgent.as_str()] },
            "status": { "$ne": TodoStatus::Completed.as_str() }
        }))
        .await?;

        Ok(TodoStats {
            total,
            pending,
            in_progress,
            completed,
            cancelled,
            overdue,
            high_priority,
            completion_rate: completion_rate(completed, total),
        })
    }

    fn overdue_where(auth: &AuthContext, now: DateTime<Utc>) -> Value {
        json!({
            "user_id": auth.user_id,
            "status": { "$ne": TodoStatus::Completed.as_str() },
            "due_date": { "$lt": now }
        })
    }
}

fn completion_rate(completed: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (completed as f64 / total as f64 * 10000.0).round() / 100.0
}

fn not_found_as_todo(err: ApiError) -> ApiError {
    match err {
        ApiError::NotFound(_) => ApiError::not_found("Todo not found"),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::models::{Role, Tenant};
    use crate::database::{MemoryStore, Store, TenantScope};
    use std::sync::Arc;

    struct Fixture {
        service: TodoService,
        alice: AuthContext,
        bob: AuthContext,
        mallory: AuthContext,
    }

    async fn fixture() -> Fixture {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let state = AppState::new(AppConfig::in_memory(), store).unwrap();
        let tenants = state.repository::<Tenant>();
        let acme = tenants.create(Tenant::new("Acme", "acme"), TenantScope::Unscoped).await.unwrap();
        let other = tenants.create(Tenant::new("Other", "other"), TenantScope::Unscoped).await.unwrap();
        let auth = |tenant_id| AuthContext {
            user_id: Uuid::new_v4(),
            tenant_id,
            role: Role::User,
            email: "u@x.com".into(),
        };
        Fixture {
            service: TodoService::new(&state),
            alice: auth(acme.id),
            bob: auth(acme.id),
            mallory: auth(other.id),
        }
    }

    fn input(title: &str) -> CreateTodoInput {
        CreateTodoInput {
            title: title.to_string(),
            description: None,
            status: None,
            priority: None,
            due_date: None,
            list_id: None,
        }
    }

    fn due_in(title: &str, offset: Duration, status: &str) -> CreateTodoInput {
        CreateTodoInput {
            due_date: Some((Utc::now() + offset).to_rfc3339()),
            status: Some(status.to_string()),
            ..input(title)
        }
    }

    #[tokio::test]
    async fn create_applies_defaults_and_validates() {
        let f = fixture().await;
        let todo = f.service.create(&f.alice, input("  Buy milk ")).await.unwrap();
        assert_eq!(todo.title, "Buy milk");
        assert_eq!(todo.status, TodoStatus::Pending);
        assert_eq!(todo.priority, TodoPriority::Medium);
        assert_eq!(todo.tenant_id, f.alice.tenant_id);

        let bad = CreateTodoInput {
            title: "   ".into(),
            description: Some("x".repeat(1001)),
            status: Some("DONE".into()),
            priority: Some("SOMEDAY".into()),
            due_date: Some("tomorrow".into()),
            list_id: Some("nope".into()),
        };
        match f.service.create(&f.alice, bad).await.unwrap_err() {
            ApiError::ValidationError { field_errors: Some(fields), .. } => {
                for field in ["title", "description", "status", "priority", "due_date", "list_id"] {
                    assert!(fields.contains_key(field), "{}", field);
                }
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn cross_tenant_is_not_found_and_cross_owner_is_forbidden() {
        let f = fixture().await;
        let todo = f.service.create(&f.alice, input("private")).await.unwrap();

        assert!(matches!(f.service.get(&f.mallory, todo.id).await.unwrap_err(), ApiError::NotFound(_)));
        assert!(matches!(
            f.service.update(&f.mallory, todo.id, UpdateTodoInput::default()).await.unwrap_err(),
            ApiError::NotFound(_)
        ));
        assert!(matches!(f.service.delete(&f.mallory, todo.id).await.unwrap_err(), ApiError::NotFound(_)));

        assert!(matches!(f.service.get(&f.bob, todo.id).await.unwrap_err(), ApiError::Forbidden(_)));
        assert!(matches!(f.service.delete(&f.bob, todo.id).await.unwrap_err(), ApiError::Forbidden(_)));

        assert_eq!(f.service.get(&f.alice, todo.id).await.unwrap().title, "private");
    }

    #[tokio::test]
    async fn update_patches_and_clears_fields() {
        let f = fixture().await;
        let todo = f
            .service
            .create(&f.alice, CreateTodoInput { description: Some("d".into()), ..due_in("t", Duration::days(1), "PENDING") })
            .await
            .unwrap();

        let body: UpdateTodoInput =
            serde_json::from_value(json!({ "status": "COMPLETED", "description": null })).unwrap();
        let updated = f.service.update(&f.alice, todo.id, body).await.unwrap();
        assert_eq!(updated.status, TodoStatus::Completed);
        assert!(updated.completed_at.is_some());
        assert_eq!(updated.description, None);
        // Absent fields untouched
        assert_eq!(updated.due_date, todo.due_date);
        assert_eq!(updated.title, "t");
    }

    #[tokio::test]
    async fn upcoming_and_overdue_windows() {
        let f = fixture().await;
        let soon = f.service.create(&f.alice, due_in("soon", Duration::days(3), "PENDING")).await.unwrap();
        let late = f.service.create(&f.alice, due_in("late", Duration::days(-1), "PENDING")).await.unwrap();
        f.service.create(&f.alice, due_in("far", Duration::days(10), "PENDING")).await.unwrap();
        f.service.create(&f.alice, due_in("done-soon", Duration::days(2), "COMPLETED")).await.unwrap();
        f.service.create(&f.alice, due_in("done-late", Duration::days(-2), "COMPLETED")).await.unwrap();
        f.service.create(&f.bob, due_in("bobs", Duration::days(1), "PENDING")).await.unwrap();

        let upcoming: Vec<_> = f.service.upcoming(&f.alice).await.unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(upcoming, vec![soon.id]);
        let overdue: Vec<_> = f.service.overdue(&f.alice).await.unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(overdue, vec![late.id]);

        // Completing removes it from both views
        let body: UpdateTodoInput = serde_json::from_value(json!({ "status": "COMPLETED" })).unwrap();
        f.service.update(&f.alice, soon.id, body).await.unwrap();
        assert!(f.service.upcoming(&f.alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stats_add_up() {
        let f = fixture().await;
        assert_eq!(f.service.stats(&f.alice).await.unwrap().completion_rate, 0.0);

        for (title, status, priority) in [
            ("a", "PENDING", "HIGH"),
            ("b", "IN_PROGRESS", "URGENT"),
            ("c", "COMPLETED", "HIGH"),
            ("d", "CANCELLED", "LOW"),
            ("e", "COMPLETED", "MEDIUM"),
            ("f", "PENDING", "LOW"),
        ] {
            let todo = CreateTodoInput { priority: Some(priority.into()), ..due_in(title, Duration::days(-1), status) };
            f.service.create(&f.alice, todo).await.unwrap();
        }

        let stats = f.service.stats(&f.alice).await.unwrap();
        assert_eq!(stats.total, 6);
        assert_eq!(stats.pending + stats.in_progress + stats.completed + stats.cancelled, stats.total);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.overdue, 4);
        assert_eq!(stats.high_priority, 2);
        assert_eq!(stats.completion_rate, 33.33);

        // Other users' todos never count
        assert_eq!(f.service.stats(&f.bob).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn list_filters_sorts_and_paginates() {
        let f = fixture().await;
        for i in 0..5 {
            let todo = CreateTodoInput {
                description: Some(if i % 2 == 0 { "groceries run".into() } else { "work".into() }),
                ..input(&format!("task {}", i))
            };
            f.service.create(&f.alice, todo).await.unwrap();
        }
        f.service.create(&f.mallory, input("task x")).await.unwrap();

        let query = ListTodosQuery {
            search: Some("GROCER".into()),
            sort_by: Some("title".into()),
            sort_order: Some("asc".into()),
            page: Some(1),
            page_size: Some(2),
            ..Default::default()
        };
        let page = f.service.list(&f.alice, query).await.unwrap();
        assert_eq!(page.pagination.total, 3);
        assert_eq!(page.pagination.total_pages, 2);
        let titles: Vec<_> = page.data.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["task 0", "task 2"]);

        let query = ListTodosQuery { sort_by: Some("priority".into()), ..Default::default() };
        assert!(matches!(f.service.list(&f.alice, query).await.unwrap_err(), ApiError::ValidationError { .. }));

        let query = ListTodosQuery { status: Some("PENDING,IN_PROGRESS".into()), ..Default::default() };
        assert_eq!(f.service.list(&f.alice, query).await.unwrap().pagination.total, 5);
    }

    #[tokio::test]
    async fn search_treats_wildcards_literally() {
        let f = fixture().await;
        for title in ["axb", "plain", "a_b done", "100% sure"] {
            f.service.create(&f.alice, input(title)).await.unwrap();
        }
        let search = |text: &str| ListTodosQuery { search: Some(text.into()), ..Default::default() };

        let page = f.service.list(&f.alice, search("a_b")).await.unwrap();
        assert_eq!(page.data.iter().map(|t| t.title.as_str()).collect::<Vec<_>>(), vec!["a_b done"]);
        let page = f.service.list(&f.alice, search("%")).await.unwrap();
        assert_eq!(page.data.iter().map(|t| t.title.as_str()).collect::<Vec<_>>(), vec!["100% sure"]);
        assert_eq!(f.service.list(&f.alice, search("\\")).await.unwrap().pagination.total, 0);
    }

    #[test]
    fn completion_rate_rounds_to_two_decimals() {
        assert_eq!(completion_rate(0, 0), 0.0);
        assert_eq!(completion_rate(1, 3), 33.33);
        assert_eq!(completion_rate(2, 3), 66.67);
        assert_eq!(completion_rate(4, 4), 100.0);
    }
}
