use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::error::FilterError;
use super::types::{is_valid_identifier, FilterOp, FilterOrderInfo, LogicalOp, SortDirection};

/// Evaluates the same WHERE documents `FilterWhere` compiles, directly
/// against in-memory JSON records.
pub struct FilterMatch;

impl FilterMatch {
    pub fn matches(where_data: &Value, record: &Map<String, Value>) -> Result<bool, FilterError> {
        let obj = match where_data {
            Value::Null => return Ok(true),
            Value::Object(obj) => obj,
            _ => return Err(FilterError::InvalidWhereClause("Unsupported WHERE format".to_string())),
        };

        for (key, value) in obj {
            let ok = if key.starts_with('$') {
                Self::matches_logical(key, value, record)?
            } else {
                Self::matches_field(key, value, record)?
            };
            if !ok {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn matches_logical(op_key: &str, value: &Value, record: &Map<String, Value>) -> Result<bool, FilterError> {
        let op = LogicalOp::parse(op_key).ok_or_else(|| FilterError::UnsupportedOperator(op_key.to_string()))?;
        match op {
            LogicalOp::And | LogicalOp::Or => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op_key)))?;
                let mut results = Vec::with_capacity(arr.len());
                for node in arr {
                    results.push(Self::matches(node, record)?);
                }
                Ok(if op == LogicalOp::And {
                    results.iter().all(|r| *r)
                } else {
                    results.iter().any(|r| *r)
                })
            }
            LogicalOp::Not => Ok(!Self::matches(value, record)?),
        }
    }

    fn matches_field(field: &str, value: &Value, record: &Map<String, Value>) -> Result<bool, FilterError> {
        if !is_valid_identifier(field) {
            return Err(FilterError::InvalidColumn(format!("Invalid column name format: {}", field)));
        }
        let actual = record.get(field).unwrap_or(&Value::Null);
        match value {
            Value::Object(obj) => {
                for (op_key, op_val) in obj {
                    let operator = FilterOp::parse(op_key)
                        .ok_or_else(|| FilterError::UnsupportedOperator(op_key.to_string()))?;
                    if !Self::matches_condition(actual, operator, op_val)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            _ => Self::matches_condition(actual, FilterOp::Eq, value),
        }
    }

    fn matches_condition(actual: &Value, operator: FilterOp, data: &Value) -> Result<bool, FilterError> {
        // SQL semantics: comparisons against NULL are never true
        let result = match operator {
            FilterOp::Eq if data.is_null() => actual.is_null(),
            FilterOp::Ne if data.is_null() => !actual.is_null(),
            _ if actual.is_null() => false,
            FilterOp::Eq => compare(actual, data) == Some(Ordering::Equal),
            FilterOp::Ne => compare(actual, data).is_some_and(|o| o != Ordering::Equal),
            FilterOp::Gt => compare(actual, data) == Some(Ordering::Greater),
            FilterOp::Gte => matches!(compare(actual, data), Some(Ordering::Greater | Ordering::Equal)),
            FilterOp::Lt => compare(actual, data) == Some(Ordering::Less),
            FilterOp::Lte => matches!(compare(actual, data), Some(Ordering::Less | Ordering::Equal)),
            FilterOp::Like | FilterOp::ILike => {
                let pattern = data
                    .as_str()
                    .ok_or_else(|| FilterError::InvalidOperatorData("pattern must be a string".to_string()))?;
                let text = as_text(actual);
                if operator == FilterOp::ILike {
                    like(&text.to_lowercase(), &pattern.to_lowercase())
                } else {
                    like(&text, pattern)
                }
            }
            FilterOp::In | FilterOp::NIn => {
                let values = data
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData("$in/$nin require an array".to_string()))?;
                let found = values.iter().any(|v| compare(actual, v) == Some(Ordering::Equal));
                if operator == FilterOp::In {
                    found
                } else {
                    !found
                }
            }
            FilterOp::Between => match data.as_array() {
                Some(values) if values.len() == 2 => {
                    matches!(compare(actual, &values[0]), Some(Ordering::Greater | Ordering::Equal))
                        && matches!(compare(actual, &values[1]), Some(Ordering::Less | Ordering::Equal))
                }
                _ => {
                    return Err(FilterError::InvalidOperatorData(
                        "$between requires exactly 2 values".to_string(),
                    ))
                }
            },
        };
        Ok(result)
    }

    /// Stable sort following Postgres NULL placement: last for ASC, first for DESC.
    pub fn sort_records(records: &mut [Map<String, Value>], order: &[FilterOrderInfo]) {
        if order.is_empty() {
            return;
        }
        records.sort_by(|a, b| {
            for info in order {
                let left = a.get(&info.column).unwrap_or(&Value::Null);
                let right = b.get(&info.column).unwrap_or(&Value::Null);
                let ordering = match (left.is_null(), right.is_null()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    (false, false) => compare(left, right).unwrap_or(Ordering::Equal),
                };
                let ordering = match info.sort {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }
}

/// Timestamps compare chronologically, numbers numerically, everything else
/// as text. Returns None for values that cannot be ordered against each other.
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Number(l), Value::Number(r)) => l.as_f64()?.partial_cmp(&r.as_f64()?),
        (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
        (Value::String(l), Value::String(r)) => match (parse_timestamp(l), parse_timestamp(r)) {
            (Some(lt), Some(rt)) => Some(lt.cmp(&rt)),
            _ => Some(l.cmp(r)),
        },
        _ => Some(as_text(left).cmp(&as_text(right))),
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// SQL LIKE: `%` matches any run of characters, `_` exactly one, and `\`
/// makes the next character literal (the Postgres default escape).
fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == '%' {
            backtrack = Some((p, t));
            p += 1;
            continue;
        }
        if p < pattern.len() {
            let (expected, width) = match pattern[p] {
                '\\' if p + 1 < pattern.len() => (Some(pattern[p + 1]), 2),
                '_' => (None, 1),
                c => (Some(c), 1),
            };
            if expected.map_or(true, |c| c == text[t]) {
                t += 1;
                p += width;
                continue;
            }
        }
        match backtrack {
            Some((bp, bt)) => {
                p = bp + 1;
                t = bt + 1;
                backtrack = Some((bp, bt + 1));
            }
            None => return false,
        }
    }
    while p < pattern.len() && pattern[p] == '%' {
        p += 1;
    }
    p == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::contains_pattern;
    use serde_json::json;

    fn record(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn implicit_equality_and_operators() {
        let todo = record(json!({ "status": "PENDING", "title": "Buy milk", "due_date": "2026-03-01T10:00:00Z" }));
        assert!(FilterMatch::matches(&json!({ "status": "PENDING" }), &todo).unwrap());
        assert!(!FilterMatch::matches(&json!({ "status": "COMPLETED" }), &todo).unwrap());
        assert!(FilterMatch::matches(&json!({ "title": { "$ilike": "%MILK%" } }), &todo).unwrap());
        assert!(!FilterMatch::matches(&json!({ "title": { "$like": "%MILK%" } }), &todo).unwrap());
        assert!(FilterMatch::matches(&json!({ "status": { "$in": ["PENDING", "IN_PROGRESS"] } }), &todo).unwrap());
    }

    #[test]
    fn timestamps_compare_chronologically() {
        let todo = record(json!({ "due_date": "2026-03-01T10:00:00+00:00" }));
        let filter = json!({ "due_date": { "$gte": "2026-03-01T09:00:00Z", "$lt": "2026-03-01T12:00:00+01:00" } });
        // 12:00+01:00 is 11:00Z
        assert!(FilterMatch::matches(&filter, &todo).unwrap());
    }

    #[test]
    fn null_never_satisfies_comparisons() {
        let todo = record(json!({ "due_date": null }));
        assert!(!FilterMatch::matches(&json!({ "due_date": { "$lt": "2026-01-01T00:00:00Z" } }), &todo).unwrap());
        assert!(FilterMatch::matches(&json!({ "due_date": null }), &todo).unwrap());
        assert!(!FilterMatch::matches(&json!({ "due_date": { "$ne": null } }), &todo).unwrap());
    }

    #[test]
    fn logical_combinators() {
        let todo = record(json!({ "status": "COMPLETED", "priority": "HIGH" }));
        let filter = json!({ "$or": [ { "status": "PENDING" }, { "$not": { "priority": "LOW" } } ] });
        assert!(FilterMatch::matches(&filter, &todo).unwrap());
        assert!(FilterMatch::matches(&json!({ "$and": [] }), &todo).unwrap());
        assert!(!FilterMatch::matches(&json!({ "$or": [] }), &todo).unwrap());
    }

    #[test]
    fn like_wildcards() {
        assert!(like("groceries", "gro%"));
        assert!(like("groceries", "%ies"));
        assert!(like("groceries", "g_oc%s"));
        assert!(!like("groceries", "g_c%"));
        assert!(like("", "%"));
    }

    #[test]
    fn like_honors_backslash_escape() {
        assert!(like("a_b", "%a\\_b%"));
        assert!(!like("axb", "%a\\_b%"));
        assert!(like("100%", "%0\\%"));
        assert!(!like("1000", "%0\\%"));
        assert!(like("c:\\dir", "%:\\\\d%"));
        assert_eq!(contains_pattern("a_b%c\\"), "%a\\_b\\%c\\\\%");
        assert!(like("x a_b y", &contains_pattern("a_b")));
        assert!(!like("plain", &contains_pattern("%")));
    }

    #[test]
    fn sort_places_nulls_like_postgres() {
        let mut rows = vec![
            record(json!({ "title": "b", "due_date": null })),
            record(json!({ "title": "a", "due_date": "2026-02-01T00:00:00Z" })),
            record(json!({ "title": "c", "due_date": "2026-01-01T00:00:00Z" })),
        ];
        let asc = [FilterOrderInfo { column: "due_date".into(), sort: SortDirection::Asc }];
        FilterMatch::sort_records(&mut rows, &asc);
        let titles: Vec<_> = rows.iter().map(|r| r["title"].as_str().unwrap().to_string()).collect();
        assert_eq!(titles, vec!["c", "a", "b"]);

        let desc = [FilterOrderInfo { column: "due_date".into(), sort: SortDirection::Desc }];
        FilterMatch::sort_records(&mut rows, &desc);
        assert_eq!(rows[0]["title"], "b");
    }
}
