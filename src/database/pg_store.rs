use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgArguments, PgPool, Row};

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::store::{Record, Store, Table};
use crate::filter::filter_where::FilterWhere;
use crate::filter::{Filter, FilterData};

type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, PgArguments>;

/// Postgres-backed store. Rows travel as JSON in both directions:
/// `row_to_json` on the way out, `jsonb_populate_record` on the way in, so
/// column types are coerced by Postgres rather than per-entity bind code.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn filter(table: &Table) -> Result<Filter, DatabaseError> {
        Ok(Filter::new(table.name)?.columns(table.columns))
    }

    fn column_list(table: &Table) -> String {
        table
            .columns
            .iter()
            .filter(|c| c.name != "id")
            .map(|c| format!("\"{}\"", c.name))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[async_trait]
impl Store for PgStore {
    async fn select(&self, table: &Table, filter_data: FilterData) -> Result<Vec<Record>, DatabaseError> {
        let mut filter = Self::filter(table)?;
        filter.assign(filter_data)?;
        let sql = filter.to_sql()?;

        let mut q = sqlx::query(&sql.query);
        for p in sql.params.iter() {
            q = bind_param(q, p);
        }
        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(|row| into_record(row.try_get("row")?)).collect()
    }

    async fn count(&self, table: &Table, where_clause: Value) -> Result<i64, DatabaseError> {
        let mut filter = Self::filter(table)?;
        filter.where_clause(where_clause)?;
        let sql = filter.to_count_sql()?;

        let mut q = sqlx::query(&sql.query);
        for p in sql.params.iter() {
            q = bind_param(q, p);
        }
        let row = q.fetch_one(&self.pool).await?;
        let count: i64 = row.try_get("count")?;
        Ok(count)
    }

    async fn insert(&self, table: &Table, record: Record) -> Result<Record, DatabaseError> {
        let query = format!(
            "INSERT INTO \"{table}\" AS t SELECT * FROM jsonb_populate_record(NULL::\"{table}\", $1::jsonb) RETURNING row_to_json(t) AS row",
            table = table.name
        );
        let row = sqlx::query(&query)
            .bind(Value::Object(record))
            .fetch_one(&self.pool)
            .await?;
        into_record(row.try_get("row")?)
    }

    async fn update(&self, table: &Table, where_clause: Value, record: Record) -> Result<Option<Record>, DatabaseError> {
        // $1 is the record itself; predicate placeholders start at $2
        let (where_sql, params) = FilterWhere::generate(&where_clause, table.columns, 1)?;
        let columns = Self::column_list(table);
        let query = format!(
            "UPDATE \"{table}\" AS t SET ({columns}) = (SELECT {columns} FROM jsonb_populate_record(NULL::\"{table}\", $1::jsonb)) WHERE {where_sql} RETURNING row_to_json(t) AS row",
            table = table.name,
        );

        let mut q = sqlx::query(&query).bind(Value::Object(record));
        for p in params.iter() {
            q = bind_param(q, p);
        }
        let rows = q.fetch_all(&self.pool).await?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(into_record(row.try_get("row")?)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, table: &Table, where_clause: Value) -> Result<u64, DatabaseError> {
        let (where_sql, params) = FilterWhere::generate(&where_clause, table.columns, 0)?;
        let query = format!("DELETE FROM \"{}\" WHERE {}", table.name, where_sql);

        let mut q = sqlx::query(&query);
        for p in params.iter() {
            q = bind_param(q, p);
        }
        let result = q.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }

    async fn close(&self) {
        DatabaseManager::close(&self.pool).await;
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

fn into_record(value: Value) -> Result<Record, DatabaseError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(DatabaseError::QueryError(format!("expected a JSON row, got {}", other))),
    }
}

/// Placeholders carry their own casts (`$1::uuid`), so scalars bind as
/// their natural Postgres type and are converted server-side.
fn bind_param<'q>(q: PgQuery<'q>, v: &'q Value) -> PgQuery<'q> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s.as_str()),
        // FilterWhere rejects non-scalar comparisons before binding
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::ColumnDef;

    const COLUMNS: &[ColumnDef] = &[
        ColumnDef::new("id", "uuid"),
        ColumnDef::new("tenant_id", "uuid"),
        ColumnDef::new("title", "text"),
    ];

    #[test]
    fn column_list_skips_primary_key() {
        let table = Table { name: "todos", columns: COLUMNS, unique: &[], tenant_column: Some("tenant_id") };
        assert_eq!(PgStore::column_list(&table), "\"tenant_id\", \"title\"");
    }

    #[test]
    fn rejects_non_object_rows() {
        assert!(into_record(Value::from(1)).is_err());
    }
}
