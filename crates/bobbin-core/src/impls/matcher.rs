//! Evaluation of `Filter` and `Sort` against JSON bodies.

use std::cmp::Ordering;

use serde_json::Value;

use crate::ports::{Filter, Sort, SortOrder};

/// Resolve a dotted field path.
fn field<'a>(body: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(body, |value, key| value.get(key))
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn equal(a: &Value, b: &Value) -> bool {
    compare(a, b) == Some(Ordering::Equal) || a == b
}

pub(crate) fn matches(filter: &Filter, body: &Value) -> bool {
    match filter {
        Filter::MatchAll => true,
        Filter::Equals { field: path, value } => field(body, path).is_some_and(|v| equal(v, value)),
        Filter::In { field: path, values } => {
            field(body, path).is_some_and(|v| values.iter().any(|candidate| equal(v, candidate)))
        }
        Filter::Missing { field: path } => field(body, path).is_none_or(Value::is_null),
        Filter::LessThan { field: path, value } => {
            field(body, path).is_some_and(|v| compare(v, value) == Some(Ordering::Less))
        }
        Filter::And(filters) => filters.iter().all(|f| matches(f, body)),
        Filter::Or(filters) => filters.iter().any(|f| matches(f, body)),
    }
}

/// Order two bodies by the sort keys; missing or incomparable values sort last.
pub(crate) fn order(sort: &[Sort], a: &Value, b: &Value) -> Ordering {
    for key in sort {
        let left = field(a, &key.field).filter(|v| !v.is_null());
        let right = field(b, &key.field).filter(|v| !v.is_null());
        let ordering = match (left, right) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(l), Some(r)) => {
                let natural = compare(l, r).unwrap_or(Ordering::Equal);
                match key.order {
                    SortOrder::Ascending => natural,
                    SortOrder::Descending => natural.reverse(),
                }
            }
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}
