//! Backend-neutral search predicates.
//!
//! A small filter tree over top-level (or dotted) document fields. Backends
//! translate it into their own query language; the in-memory store evaluates it
//! directly.

use std::time::Duration;

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    MatchAll,
    Equals { field: String, value: Value },
    In { field: String, values: Vec<Value> },
    /// Field absent or `null`.
    Missing { field: String },
    /// Field present and strictly less than `value` (numbers or strings).
    LessThan { field: String, value: Value },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn any_of<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Filter::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn missing(field: impl Into<String>) -> Self {
        Filter::Missing { field: field.into() }
    }

    pub fn less_than(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::LessThan {
            field: field.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    pub field: String,
    pub order: SortOrder,
}

impl Sort {
    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Descending,
        }
    }

    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Ascending,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub filter: Filter,
    pub sort: Vec<Sort>,
    /// Page size.
    pub size: usize,
    /// Return document bodies; `false` yields ids and versions only.
    pub with_source: bool,
    /// Open a scroll cursor kept alive for this long.
    pub scroll: Option<Duration>,
}

impl SearchRequest {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            sort: Vec::new(),
            size: 10,
            with_source: true,
            scroll: None,
        }
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn ids_only(mut self) -> Self {
        self.with_source = false;
        self
    }

    pub fn scroll(mut self, keep_alive: Duration) -> Self {
        self.scroll = Some(keep_alive);
        self
    }
}
