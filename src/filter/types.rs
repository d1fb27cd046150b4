use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "$eq")] Eq,
    #[serde(rename = "$ne")] Ne,
    #[serde(rename = "$gt")] Gt,
    #[serde(rename = "$gte")] Gte,
    #[serde(rename = "$lt")] Lt,
    #[serde(rename = "$lte")] Lte,

    #[serde(rename = "$like")] Like,
    #[serde(rename = "$ilike")] ILike,

    #[serde(rename = "$in")] In,
    #[serde(rename = "$nin")] NIn,

    #[serde(rename = "$between")] Between,
}

impl FilterOp {
    pub fn parse(op_key: &str) -> Option<Self> {
        Some(match op_key {
            "$eq" => FilterOp::Eq,
            "$ne" | "$neq" => FilterOp::Ne,
            "$gt" => FilterOp::Gt,
            "$gte" => FilterOp::Gte,
            "$lt" => FilterOp::Lt,
            "$lte" => FilterOp::Lte,
            "$like" => FilterOp::Like,
            "$ilike" => FilterOp::ILike,
            "$in" => FilterOp::In,
            "$nin" => FilterOp::NIn,
            "$between" => FilterOp::Between,
            _ => return None,
        })
    }
}

/// Logical combinators accepted at any level of a WHERE document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Not,
}

impl LogicalOp {
    pub fn parse(op_key: &str) -> Option<Self> {
        match op_key {
            "$and" => Some(LogicalOp::And),
            "$or" => Some(LogicalOp::Or),
            "$not" => Some(LogicalOp::Not),
            _ => None,
        }
    }
}

/// Column name and the Postgres type parameters are cast to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub pg_type: &'static str,
}

impl ColumnDef {
    pub const fn new(name: &'static str, pg_type: &'static str) -> Self {
        Self { name, pg_type }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterData {
    pub where_clause: Option<Value>,
    pub order: Option<Value>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl FilterData {
    pub fn with_where(where_clause: Value) -> Self {
        Self {
            where_clause: Some(where_clause),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOrderInfo {
    pub column: String,
    pub sort: SortDirection,
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Value>,
}

pub(crate) fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
