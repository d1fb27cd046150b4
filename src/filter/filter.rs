use serde_json::Value;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{is_valid_identifier, ColumnDef, FilterData, FilterOrderInfo, SqlResult};

/// SELECT/COUNT builder over a single table. Rows come back as one JSON
/// column (`row`) so callers can deserialize any entity shape.
pub struct Filter {
    table_name: String,
    columns: &'static [ColumnDef],
    where_data: Option<Value>,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl Filter {
    pub fn new(table_name: impl Into<String>) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        if !is_valid_identifier(&table_name) {
            return Err(FilterError::InvalidTableName(format!("Invalid table name format: {}", table_name)));
        }
        Ok(Self {
            table_name,
            columns: &[],
            where_data: None,
            order_data: vec![],
            limit: None,
            offset: None,
        })
    }

    /// Restrict predicates and ordering to known columns and cast parameters
    /// to each column's type.
    pub fn columns(mut self, columns: &'static [ColumnDef]) -> Self {
        self.columns = columns;
        self
    }

    pub fn assign(&mut self, data: FilterData) -> Result<&mut Self, FilterError> {
        if let Some(where_clause) = data.where_clause {
            self.where_clause(where_clause)?;
        }
        if let Some(order) = data.order {
            self.order(order)?;
        }
        if let Some(limit) = data.limit {
            self.limit(limit, data.offset)?;
        }
        Ok(self)
    }

    pub fn where_clause(&mut self, conditions: Value) -> Result<&mut Self, FilterError> {
        FilterWhere::validate(&conditions)?;
        self.where_data = Some(conditions);
        Ok(self)
    }

    pub fn order(&mut self, order_spec: Value) -> Result<&mut Self, FilterError> {
        self.order_data = FilterOrder::validate_and_parse(&order_spec, self.columns)?;
        Ok(self)
    }

    pub fn limit(&mut self, limit: i64, offset: Option<i64>) -> Result<&mut Self, FilterError> {
        if limit < 0 {
            return Err(FilterError::InvalidLimit("Limit must be non-negative".to_string()));
        }
        if let Some(off) = offset {
            if off < 0 {
                return Err(FilterError::InvalidOffset("Offset must be non-negative".to_string()));
            }
        }
        self.limit = Some(limit);
        self.offset = offset;
        Ok(self)
    }

    pub fn order_info(&self) -> &[FilterOrderInfo] {
        &self.order_data
    }

    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql()?;
        let order_clause = FilterOrder::generate(&self.order_data);
        let limit_clause = self.build_limit_clause();

        let query = [
            "SELECT row_to_json(t) AS row".to_string(),
            format!("FROM \"{}\" AS t", self.table_name),
            format!("WHERE {}", where_result.query),
            order_clause,
            limit_clause,
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        Ok(SqlResult { query, params: where_result.params })
    }

    pub fn to_where_sql(&self) -> Result<SqlResult, FilterError> {
        let (query, params) = match &self.where_data {
            Some(where_data) => FilterWhere::generate(where_data, self.columns, 0)?,
            None => ("1=1".to_string(), vec![]),
        };
        Ok(SqlResult { query, params })
    }

    pub fn to_count_sql(&self) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql()?;
        let query = format!(
            "SELECT COUNT(*) AS count FROM \"{}\" WHERE {}",
            self.table_name, where_result.query
        );
        Ok(SqlResult { query, params: where_result.params })
    }

    fn build_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            (None, Some(o)) => format!("OFFSET {}", o),
            (None, None) => String::new(),
        }
    }
}
