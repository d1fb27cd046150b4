use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::database::manager::DatabaseError;
use crate::filter::{ColumnDef, FilterData};

/// A row as the store sees it: column name to JSON value.
pub type Record = Map<String, Value>;

/// Static description of a table. Columns double as the allow-list for
/// filter and sort keys and carry the Postgres type parameters are cast to.
#[derive(Debug, Clone, Copy)]
pub struct Table {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
    /// Column sets that must be unique across the table
    pub unique: &'static [&'static [&'static str]],
    /// Column holding the owning tenant, None for root entities
    pub tenant_column: Option<&'static str>,
}

impl Table {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }
}

/// Persistence collaborator behind every repository. Predicates use the
/// JSON filter language from `crate::filter`.
#[async_trait]
pub trait Store: Send + Sync {
    async fn select(&self, table: &Table, filter: FilterData) -> Result<Vec<Record>, DatabaseError>;

    async fn count(&self, table: &Table, where_clause: Value) -> Result<i64, DatabaseError>;

    async fn insert(&self, table: &Table, record: Record) -> Result<Record, DatabaseError>;

    /// Replace every row matching `where_clause` with `record` (all columns
    /// but `id`). Returns the first updated row, None when nothing matched.
    async fn update(&self, table: &Table, where_clause: Value, record: Record) -> Result<Option<Record>, DatabaseError>;

    /// Returns the number of deleted rows
    async fn delete(&self, table: &Table, where_clause: Value) -> Result<u64, DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;

    async fn close(&self);

    fn backend(&self) -> &'static str;
}
