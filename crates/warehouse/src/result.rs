use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single scalar cell value.
///
/// Cells are decoded from the service's string encoding using the declared
/// column type; `Null` represents SQL NULL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

/// One result row: an ordered mapping from column name to cell value.
///
/// Column order matches the query's SELECT list as returned by the service;
/// no local re-sorting happens anywhere downstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    cells: IndexMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from `(column, value)` pairs, preserving order.
    pub fn from_pairs<N, I>(pairs: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, Value)>,
    {
        let cells = pairs
            .into_iter()
            .map(|(name, value)| (name.into(), value))
            .collect();
        Self { cells }
    }

    /// Append a cell. A repeated column name overwrites the earlier cell.
    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.cells.insert(name.into(), value);
    }

    /// Look up a cell by column name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.cells.get(name)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.cells.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.cells.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl fmt::Display for Row {
    /// Tuple-style rendering: `(romeo, 100)`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.cells.values().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{value}")?;
        }
        write!(f, ")")
    }
}

/// One page of a result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultPage {
    /// Rows in service order.
    pub rows: Vec<Row>,
    /// Total row count across all pages, when the service reports it.
    pub total_rows: Option<u64>,
    /// Continuation token for the next page; absent on the final page.
    pub page_token: Option<String>,
}

impl ResultPage {
    /// Final page with no continuation.
    pub fn last(rows: Vec<Row>) -> Self {
        Self {
            rows,
            total_rows: None,
            page_token: None,
        }
    }
}
