use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::entity::Entity;
use crate::database::store::Table;
use crate::filter::ColumnDef;

/// Labels that can never be claimed as a tenant subdomain
const RESERVED_SUBDOMAINS: &[&str] = &["www", "api", "app", "admin", "mail"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub subdomain: String,
    pub active: bool,
    pub primary_color: Option<String>,
    pub logo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    pub fn new(name: impl Into<String>, subdomain: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            subdomain: subdomain.into(),
            active: true,
            primary_color: None,
            logo_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn display(&self) -> TenantDisplay {
        TenantDisplay {
            id: self.id,
            name: self.name.clone(),
            subdomain: self.subdomain.clone(),
            primary_color: self.primary_color.clone(),
            logo_url: self.logo_url.clone(),
        }
    }
}

impl Entity for Tenant {
    const TABLE: Table = Table {
        name: "tenants",
        columns: &[
            ColumnDef::new("id", "uuid"),
            ColumnDef::new("name", "text"),
            ColumnDef::new("subdomain", "text"),
            ColumnDef::new("active", "boolean"),
            ColumnDef::new("primary_color", "text"),
            ColumnDef::new("logo_url", "text"),
            ColumnDef::new("created_at", "timestamptz"),
            ColumnDef::new("updated_at", "timestamptz"),
        ],
        unique: &[&["subdomain"]],
        tenant_column: None,
    };

    fn id(&self) -> Uuid {
        self.id
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

/// Public branding of the resolved tenant
#[derive(Debug, Clone, Serialize)]
pub struct TenantDisplay {
    pub id: Uuid,
    pub name: String,
    pub subdomain: String,
    pub primary_color: Option<String>,
    pub logo_url: Option<String>,
}

/// Lowercase `[a-z0-9-]`, 3 to 63 characters, no leading or trailing hyphen.
pub fn validate_subdomain(subdomain: &str) -> Result<(), String> {
    if subdomain.len() < 3 || subdomain.len() > 63 {
        return Err("Subdomain must be between 3 and 63 characters".to_string());
    }
    if !subdomain.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return Err("Subdomain may only contain lowercase letters, digits and hyphens".to_string());
    }
    if subdomain.starts_with('-') || subdomain.ends_with('-') {
        return Err("Subdomain cannot start or end with a hyphen".to_string());
    }
    if RESERVED_SUBDOMAINS.contains(&subdomain) {
        return Err(format!("Subdomain '{}' is reserved", subdomain));
    }
    Ok(())
}

/// `#rgb` or `#rrggbb`
pub fn validate_color(color: &str) -> Result<(), String> {
    let hex = color.strip_prefix('#').ok_or_else(|| "Color must start with '#'".to_string())?;
    if (hex.len() == 3 || hex.len() == 6) && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err("Color must be a hex value like #1a2b3c".to_string())
    }
}
