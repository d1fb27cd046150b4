use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::entity::Entity;
use crate::database::store::Table;
use crate::filter::ColumnDef;

pub const TITLE_MAX_LEN: usize = 255;
pub const DESCRIPTION_MAX_LEN: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TodoStatus {
    pub const ALL: [TodoStatus; 4] = [
        TodoStatus::Pending,
        TodoStatus::InProgress,
        TodoStatus::Completed,
        TodoStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TodoStatus::Pending => "PENDING",
            TodoStatus::InProgress => "IN_PROGRESS",
            TodoStatus::Completed => "COMPLETED",
            TodoStatus::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for TodoStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TodoStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| "Status must be one of PENDING, IN_PROGRESS, COMPLETED, CANCELLED".to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TodoPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl TodoPriority {
    pub const ALL: [TodoPriority; 4] = [
        TodoPriority::Low,
        TodoPriority::Medium,
        TodoPriority::High,
        TodoPriority::Urgent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TodoPriority::Low => "LOW",
            TodoPriority::Medium => "MEDIUM",
            TodoPriority::High => "HIGH",
            TodoPriority::Urgent => "URGENT",
        }
    }
}

impl FromStr for TodoPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TodoPriority::ALL
            .into_iter()
            .find(|priority| priority.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| "Priority must be one of LOW, MEDIUM, HIGH, URGENT".to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Todo {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TodoStatus,
    pub priority: TodoPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub list_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Todo {
    pub fn new(title: String, user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title,
            description: None,
            status: TodoStatus::Pending,
            priority: TodoPriority::Medium,
            due_date: None,
            completed_at: None,
            user_id,
            tenant_id: Uuid::nil(),
            list_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// `completed_at` follows the status: stamped on entering COMPLETED,
    /// cleared on leaving it.
    pub fn set_status(&mut self, status: TodoStatus, now: DateTime<Utc>) {
        match (self.status, status) {
            (TodoStatus::Completed, TodoStatus::Completed) => {}
            (_, TodoStatus::Completed) => self.completed_at = Some(now),
            _ => self.completed_at = None,
        }
        self.status = status;
    }
}

impl Entity for Todo {
    const TABLE: Table = Table {
        name: "todos",
        columns: &[
            ColumnDef::new("id", "uuid"),
            ColumnDef::new("title", "text"),
            ColumnDef::new("description", "text"),
            ColumnDef::new("status", "text"),
            ColumnDef::new("priority", "text"),
            ColumnDef::new("due_date", "timestamptz"),
            ColumnDef::new("completed_at", "timestamptz"),
            ColumnDef::new("user_id", "uuid"),
            ColumnDef::new("tenant_id", "uuid"),
            ColumnDef::new("list_id", "uuid"),
            ColumnDef::new("created_at", "timestamptz"),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_at_follows_status() {
        let mut todo = Todo::new("Ship it".to_string(), Uuid::new_v4());
        let t1 = Utc::now();
        todo.set_status(TodoStatus::Completed, t1);
        assert_eq!(todo.completed_at, Some(t1));

        // Re-completing keeps the original stamp
        todo.set_status(TodoStatus::Completed, t1 + chrono::Duration::hours(1));
        assert_eq!(todo.completed_at, Some(t1));

        todo.set_status(TodoStatus::InProgress, t1);
        assert_eq!(todo.completed_at, None);
    }

    #[test]
    fn enums_use_screaming_case() {
        assert_eq!(serde_json::to_value(TodoStatus::InProgress).unwrap(), "IN_PROGRESS");
        assert_eq!("in_progress".parse::<TodoStatus>().unwrap(), TodoStatus::InProgress);
        assert_eq!("URGENT".parse::<TodoPriority>().unwrap(), TodoPriority::Urgent);
        assert!("SOMEDAY".parse::<TodoPriority>().is_err());
    }
}
