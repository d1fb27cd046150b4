use serde_json::Value;

use super::error::FilterError;
use super::types::{is_valid_identifier, ColumnDef, FilterOp, LogicalOp};

/// `%value%` with the LIKE wildcards and the escape character in `value`
/// escaped, so user input only ever matches as a literal substring.
pub fn contains_pattern(value: &str) -> String {
    let mut pattern = String::with_capacity(value.len() + 2);
    pattern.push('%');
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Compiles a JSON WHERE document into a parameterized SQL predicate.
///
/// `{ "status": "PENDING", "due_date": { "$lt": "2026-01-01T00:00:00Z" } }`
/// becomes `"status" = $1::text AND "due_date" < $2::timestamptz`.
/// Placeholders are numbered across nested `$and`/`$or`/`$not` branches.
pub struct FilterWhere<'a> {
    columns: &'a [ColumnDef],
    param_values: Vec<Value>,
    param_offset: usize,
}

impl<'a> FilterWhere<'a> {
    pub fn new(columns: &'a [ColumnDef], starting_param_index: usize) -> Self {
        Self {
            columns,
            param_values: vec![],
            param_offset: starting_param_index,
        }
    }

    pub fn generate(
        where_data: &Value,
        columns: &'a [ColumnDef],
        starting_param_index: usize,
    ) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = Self::new(columns, starting_param_index);
        let sql = filter_where.build_node(where_data)?;
        Ok((sql, filter_where.param_values))
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null | Value::Object(_) => Ok(()),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    fn build_node(&mut self, node: &Value) -> Result<String, FilterError> {
        let obj = match node {
            Value::Null => return Ok("1=1".to_string()),
            Value::Object(obj) => obj,
            _ => return Err(FilterError::InvalidWhereClause("Unsupported WHERE format".to_string())),
        };

        let mut parts = Vec::with_capacity(obj.len());
        for (key, value) in obj {
            if key.starts_with('$') {
                parts.push(self.build_logical(key, value)?);
            } else {
                parts.extend(self.build_field(key, value)?);
            }
        }

        Ok(if parts.is_empty() { "1=1".to_string() } else { parts.join(" AND ") })
    }

    fn build_logical(&mut self, op_key: &str, value: &Value) -> Result<String, FilterError> {
        let op = LogicalOp::parse(op_key).ok_or_else(|| FilterError::UnsupportedOperator(op_key.to_string()))?;
        match op {
            LogicalOp::And | LogicalOp::Or => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op_key)))?;
                if arr.is_empty() {
                    // Empty conjunction is true, empty disjunction is false
                    return Ok(if op == LogicalOp::And { "1=1" } else { "1=0" }.to_string());
                }
                let mut sql_parts = Vec::with_capacity(arr.len());
                for v in arr {
                    sql_parts.push(format!("({})", self.build_node(v)?));
                }
                let joiner = if op == LogicalOp::And { " AND " } else { " OR " };
                Ok(format!("({})", sql_parts.join(joiner)))
            }
            LogicalOp::Not => Ok(format!("NOT ({})", self.build_node(value)?)),
        }
    }

    fn build_field(&mut self, field: &str, value: &Value) -> Result<Vec<String>, FilterError> {
        let column = self.column(field)?;
        match value {
            Value::Object(obj) => {
                let mut parts = Vec::with_capacity(obj.len());
                for (op_key, op_val) in obj {
                    let operator = FilterOp::parse(op_key)
                        .ok_or_else(|| FilterError::UnsupportedOperator(op_key.to_string()))?;
                    parts.push(self.build_condition(&column, operator, op_val)?);
                }
                Ok(parts)
            }
            // Implicit equality: { field: value }
            _ => Ok(vec![self.build_condition(&column, FilterOp::Eq, value)?]),
        }
    }

    fn build_condition(
        &mut self,
        column: &(String, Option<&'static str>),
        operator: FilterOp,
        data: &Value,
    ) -> Result<String, FilterError> {
        let quoted_column = format!("\"{}\"", column.0);
        let sql = match operator {
            FilterOp::Eq if data.is_null() => format!("{} IS NULL", quoted_column),
            FilterOp::Ne if data.is_null() => format!("{} IS NOT NULL", quoted_column),
            FilterOp::Eq => format!("{} = {}", quoted_column, self.param(column, data)?),
            FilterOp::Ne => format!("{} <> {}", quoted_column, self.param(column, data)?),
            FilterOp::Gt => format!("{} > {}", quoted_column, self.param(column, data)?),
            FilterOp::Gte => format!("{} >= {}", quoted_column, self.param(column, data)?),
            FilterOp::Lt => format!("{} < {}", quoted_column, self.param(column, data)?),
            FilterOp::Lte => format!("{} <= {}", quoted_column, self.param(column, data)?),
            // Pattern operators always compare as text
            FilterOp::Like => format!("{}::text LIKE {} ESCAPE '\\'", quoted_column, self.text_param(data)?),
            FilterOp::ILike => format!("{}::text ILIKE {} ESCAPE '\\'", quoted_column, self.text_param(data)?),
            FilterOp::In | FilterOp::NIn => {
                let values = data
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData("$in/$nin require an array".to_string()))?;
                if values.is_empty() {
                    return Ok(if operator == FilterOp::In { "1=0" } else { "1=1" }.to_string());
                }
                let mut params = Vec::with_capacity(values.len());
                for v in values {
                    params.push(self.param(column, v)?);
                }
                let keyword = if operator == FilterOp::In { "IN" } else { "NOT IN" };
                format!("{} {} ({})", quoted_column, keyword, params.join(", "))
            }
            FilterOp::Between => match data.as_array() {
                Some(values) if values.len() == 2 => format!(
                    "{} BETWEEN {} AND {}",
                    quoted_column,
                    self.param(column, &values[0])?,
                    self.param(column, &values[1])?
                ),
                _ => {
                    return Err(FilterError::InvalidOperatorData(
                        "$between requires exactly 2 values".to_string(),
                    ))
                }
            },
        };
        Ok(sql)
    }

    /// Validates the column against the table definition when one is known.
    fn column(&self, field: &str) -> Result<(String, Option<&'static str>), FilterError> {
        if !is_valid_identifier(field) {
            return Err(FilterError::InvalidColumn(format!("Invalid column name format: {}", field)));
        }
        if self.columns.is_empty() {
            return Ok((field.to_string(), None));
        }
        self.columns
            .iter()
            .find(|c| c.name == field)
            .map(|c| (field.to_string(), Some(c.pg_type)))
            .ok_or_else(|| FilterError::InvalidColumn(format!("Unknown column: {}", field)))
    }

    fn param(&mut self, column: &(String, Option<&'static str>), value: &Value) -> Result<String, FilterError> {
        if value.is_array() || value.is_object() {
            return Err(FilterError::InvalidOperatorData(format!(
                "Column '{}' compared against a non-scalar value",
                column.0
            )));
        }
        let placeholder = self.push(value.clone());
        Ok(match column.1 {
            Some(pg_type) => format!("{}::{}", placeholder, pg_type),
            None => placeholder,
        })
    }

    fn text_param(&mut self, value: &Value) -> Result<String, FilterError> {
        match value {
            Value::String(_) => Ok(format!("{}::text", self.push(value.clone()))),
            _ => Err(FilterError::InvalidOperatorData("pattern must be a string".to_string())),
        }
    }

    fn push(&mut self, value: Value) -> String {
        self.param_values.push(value);
        format!("${}", self.param_offset + self.param_values.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const COLUMNS: &[ColumnDef] = &[
        ColumnDef::new("id", "uuid"),
        ColumnDef::new("tenant_id", "uuid"),
        ColumnDef::new("title", "text"),
        ColumnDef::new("status", "text"),
        ColumnDef::new("due_date", "timestamptz"),
    ];

    #[test]
    fn implicit_equality_casts_to_column_type() {
        let (sql, params) = FilterWhere::generate(&json!({ "status": "PENDING" }), COLUMNS, 0).unwrap();
        assert_eq!(sql, "\"status\" = $1::text");
        assert_eq!(params, vec![json!("PENDING")]);
    }

    #[test]
    fn nested_branches_keep_numbering() {
        let where_data = json!({
            "$and": [
                { "tenant_id": "6f1c0f59-0000-4000-8000-000000000001" },
                { "$or": [ { "title": { "$ilike": "%milk%" } }, { "status": { "$in": ["PENDING", "IN_PROGRESS"] } } ] }
            ]
        });
        let (sql, params) = FilterWhere::generate(&where_data, COLUMNS, 0).unwrap();
        assert_eq!(
            sql,
            "((\"tenant_id\" = $1::uuid) AND (((\"title\"::text ILIKE $2::text ESCAPE '\\') OR (\"status\" IN ($3::text, $4::text)))))"
        );
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn null_comparisons_use_is_null() {
        let (sql, params) = FilterWhere::generate(&json!({ "due_date": { "$ne": null } }), COLUMNS, 0).unwrap();
        assert_eq!(sql, "\"due_date\" IS NOT NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn rejects_unknown_columns() {
        let err = FilterWhere::generate(&json!({ "password_hash": "x" }), COLUMNS, 0).unwrap_err();
        assert!(matches!(err, FilterError::InvalidColumn(_)));
    }

    #[test]
    fn rejects_injection_in_column_names() {
        let err = FilterWhere::generate(&json!({ "id\" OR 1=1 --": "x" }), &[], 0).unwrap_err();
        assert!(matches!(err, FilterError::InvalidColumn(_)));
    }

    #[test]
    fn empty_in_list_matches_nothing() {
        let (sql, _) = FilterWhere::generate(&json!({ "id": { "$in": [] } }), COLUMNS, 0).unwrap();
        assert_eq!(sql, "1=0");
    }

    #[test]
    fn starting_index_offsets_placeholders() {
        let (sql, _) = FilterWhere::generate(&json!({ "title": "a" }), COLUMNS, 2).unwrap();
        assert_eq!(sql, "\"title\" = $3::text");
    }
}
