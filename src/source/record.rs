//! Typed scalar values and source records

use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

/// A typed scalar cell value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Integer(i64),
    /// Fixed-point decimal; never stored as binary floating point
    Decimal(Decimal),
    Timestamp(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
    Text(String),
}

impl Value {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow the raw text of a `Text` value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Name of the value's kind, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Decimal(_) => "decimal",
            Value::Timestamp(_) => "timestamp",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Text(_) => "text",
        }
    }
}

impl fmt::Display for Value {
    /// Canonical text form; stores cast this back into the typed column.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f")),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
            Value::Text(s) => write!(f, "{s}"),
        }
    }
}

/// One row of source data: an ordered mapping from column name to value
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// 1-based data row number (the header row is not counted)
    pub index: usize,
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Record {
    /// Create a record; `values` must line up with `columns`
    pub fn new(index: usize, columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self {
            index,
            columns,
            values,
        }
    }

    /// Ordered column names
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Ordered values
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Look up a value by column name
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    /// Value at a column position
    pub fn get_index(&self, position: usize) -> Option<&Value> {
        self.values.get(position)
    }

    /// Iterate over `(column, value)` pairs in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}
