use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::database::manager::DatabaseError;
use crate::database::store::{Record, Store, Table};
use crate::filter::filter_order::FilterOrder;
use crate::filter::filter_where::FilterWhere;
use crate::filter::{FilterData, FilterMatch};

/// Process-local store used by tests and `DATABASE_BACKEND=memory`.
/// Evaluates the same filter documents as `PgStore` and enforces the
/// table's unique column sets.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<&'static str, Vec<Record>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject unknown columns exactly as the SQL compiler would
    fn validate_where(table: &Table, where_clause: &Value) -> Result<(), DatabaseError> {
        FilterWhere::generate(where_clause, table.columns, 0)?;
        Ok(())
    }

    fn check_unique(table: &Table, rows: &[Record], candidate: &Record, skip_id: Option<&Value>) -> Result<(), DatabaseError> {
        let id_key: &[&str] = &["id"];
        for key in std::iter::once(id_key).chain(table.unique.iter().copied()) {
            let values: Vec<&Value> = key.iter().map(|c| candidate.get(*c).unwrap_or(&Value::Null)).collect();
            // NULLs never collide, as in Postgres
            if values.iter().any(|v| v.is_null()) {
                continue;
            }
            let clash = rows.iter().any(|row| {
                if skip_id.is_some() && row.get("id") == skip_id {
                    return false;
                }
                key.iter().zip(values.iter()).all(|(c, v)| row.get(*c) == Some(*v))
            });
            if clash {
                return Err(DatabaseError::UniqueViolation(format!("{}_{}_key", table.name, key.join("_"))));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn select(&self, table: &Table, filter: FilterData) -> Result<Vec<Record>, DatabaseError> {
        let where_clause = filter.where_clause.unwrap_or(Value::Null);
        Self::validate_where(table, &where_clause)?;
        let order = match &filter.order {
            Some(order) => FilterOrder::validate_and_parse(order, table.columns)?,
            None => vec![],
        };
        if filter.limit.is_some_and(|l| l < 0) || filter.offset.is_some_and(|o| o < 0) {
            return Err(DatabaseError::QueryError("limit and offset must be non-negative".to_string()));
        }

        let tables = self.tables.read().await;
        let mut rows = Vec::new();
        for row in tables.get(table.name).into_iter().flatten() {
            if FilterMatch::matches(&where_clause, row)? {
                rows.push(row.clone());
            }
        }
        drop(tables);

        FilterMatch::sort_records(&mut rows, &order);

        let offset = filter.offset.unwrap_or(0) as usize;
        let rows = rows.into_iter().skip(offset);
        Ok(match filter.limit {
            Some(limit) => rows.take(limit as usize).collect(),
            None => rows.collect(),
        })
    }

    async fn count(&self, table: &Table, where_clause: Value) -> Result<i64, DatabaseError> {
        Self::validate_where(table, &where_clause)?;
        let tables = self.tables.read().await;
        let mut count = 0;
        for row in tables.get(table.name).into_iter().flatten() {
            if FilterMatch::matches(&where_clause, row)? {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn insert(&self, table: &Table, record: Record) -> Result<Record, DatabaseError> {
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.name).or_default();
        Self::check_unique(table, rows, &record, None)?;
        rows.push(record.clone());
        Ok(record)
    }

    async fn update(&self, table: &Table, where_clause: Value, record: Record) -> Result<Option<Record>, DatabaseError> {
        Self::validate_where(table, &where_clause)?;
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.name).or_default();

        let mut matched = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            if FilterMatch::matches(&where_clause, row)? {
                matched.push(index);
            }
        }

        let mut first = None;
        for index in matched {
            let mut updated = record.clone();
            // id is never rewritten
            match rows[index].get("id") {
                Some(id) => updated.insert("id".to_string(), id.clone()),
                None => updated.remove("id"),
            };
            Self::check_unique(table, rows, &updated, rows[index].get("id"))?;
            rows[index] = updated.clone();
            first.get_or_insert(updated);
        }
        Ok(first)
    }

    async fn delete(&self, table: &Table, where_clause: Value) -> Result<u64, DatabaseError> {
        Self::validate_where(table, &where_clause)?;
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.name).or_default();

        let mut keep = Vec::with_capacity(rows.len());
        let mut deleted = 0;
        for row in rows.drain(..) {
            if FilterMatch::matches(&where_clause, &row)? {
                deleted += 1;
            } else {
                keep.push(row);
            }
        }
        *rows = keep;
        Ok(deleted)
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn close(&self) {}

    fn backend(&self) -> &'static str {
        "memory"
    }
}
