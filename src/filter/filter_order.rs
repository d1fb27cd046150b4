use serde_json::Value;

use super::error::FilterError;
use super::types::{is_valid_identifier, ColumnDef, FilterOrderInfo, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    pub fn validate_and_parse(order: &Value, columns: &[ColumnDef]) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let infos = match order {
            Value::String(s) => Self::parse_order_string(s),
            Value::Array(arr) => {
                // Expect array of strings like ["created_at desc", "title asc"]
                let mut out = Vec::new();
                for v in arr {
                    if let Value::String(s) = v {
                        out.extend(Self::parse_order_string(s));
                    }
                }
                out
            }
            Value::Object(obj) => {
                // { "created_at": "desc", "title": "asc" }
                obj.iter()
                    .map(|(k, v)| FilterOrderInfo {
                        column: k.clone(),
                        sort: Self::direction(v.as_str().unwrap_or("asc")),
                    })
                    .collect()
            }
            _ => vec![],
        };

        for info in &infos {
            if !is_valid_identifier(&info.column) {
                return Err(FilterError::InvalidColumn(format!("Invalid order column: {}", info.column)));
            }
            if !columns.is_empty() && !columns.iter().any(|c| c.name == info.column) {
                return Err(FilterError::InvalidColumn(format!("Unknown order column: {}", info.column)));
            }
        }
        Ok(infos)
    }

    fn parse_order_string(s: &str) -> Vec<FilterOrderInfo> {
        // split on commas, then each token into column and direction
        let mut out = Vec::new();
        for part in s.split(',') {
            let mut it = part.split_whitespace();
            if let Some(col) = it.next() {
                out.push(FilterOrderInfo {
                    column: col.to_string(),
                    sort: Self::direction(it.next().unwrap_or("asc")),
                });
            }
        }
        out
    }

    fn direction(dir: &str) -> SortDirection {
        if dir.eq_ignore_ascii_case("desc") {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }

    pub fn generate(infos: &[FilterOrderInfo]) -> String {
        if infos.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = infos
            .iter()
            .map(|i| format!("\"{}\" {}", i.column, i.sort.to_sql()))
            .collect();
        format!("ORDER BY {}", parts.join(", "))
    }
}
