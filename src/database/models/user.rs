use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::entity::Entity;
use crate::database::store::Table;
use crate::filter::ColumnDef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::User => "USER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "USER" => Ok(Role::User),
            _ => Err(format!("Role must be one of ADMIN, USER (got '{}')", s)),
        }
    }
}

/// Stored user row. Carries the password hash, so it is never returned
/// from a handler; use `UserResponse`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: Role,
    pub tenant_id: Uuid,
    pub active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: &str, password_hash: String, name: impl Into<String>, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            password_hash,
            name: name.into(),
            role,
            // Stamped by the repository on create
            tenant_id: Uuid::nil(),
            active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Entity for User {
    const TABLE: Table = Table {
        name: "users",
        columns: &[
            ColumnDef::new("id", "uuid"),
            ColumnDef::new("email", "text"),
            ColumnDef::new("password_hash", "text"),
            ColumnDef::new("name", "text"),
            ColumnDef::new("role", "text"),
            ColumnDef::new("tenant_id", "uuid"),
            ColumnDef::new("active", "boolean"),
            ColumnDef::new("last_login_at", "timestamptz"),
            ColumnDef::new("created_at", "timestamptz"),
            ColumnDef::new("updated_at", "timestamptz"),
        ],
        unique: &[&["tenant_id", "email"]],
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

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub tenant_id: Uuid,
    pub active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            tenant_id: user.tenant_id,
            active: user.active,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Shape check only: one `@`, non-empty local part, dotted domain.
pub fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    if email.len() > 254 {
        return Err("Email is too long".to_string());
    }
    let (local, domain) = email.split_once('@').ok_or_else(|| "Invalid email address".to_string())?;
    let domain_ok = !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..");
    if local.is_empty() || !domain_ok || email.chars().any(char::is_whitespace) {
        return Err("Invalid email address".to_string());
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters".to_string());
    }
    Ok(())
}

pub fn validate_name(name: &str) -> Result<(), String> {
    let len = name.trim().chars().count();
    if len == 0 || len > 100 {
        return Err("Name must be between 1 and 100 characters".to_string());
    }
    Ok(())
}
