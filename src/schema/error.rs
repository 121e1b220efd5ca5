//! Error types for schema mapping and row validation

use thiserror::Error;

/// Errors raised while building the column plan (fatal, before any write)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Required target columns have no input column
    #[error("Schema mismatch: required target column(s) missing from input: {}", .missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    /// Mapping names a target column the schema does not have
    #[error("Mapping refers to unknown target column '{0}'")]
    UnknownTargetColumn(String),

    /// Two mapping entries feed the same target column
    #[error("Target column '{0}' is mapped more than once")]
    DuplicateMapping(String),

    /// Target schema definition is unusable
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// Unrecognised type name
    #[error("Invalid column type: {0}")]
    InvalidType(String),
}

impl SchemaError {
    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            SchemaError::SchemaMismatch { missing } => format!(
                "The input is missing required column(s): {}\n\n\
                Hint: Add the columns to the input or map them with a [[mapping]] entry.",
                missing.join(", ")
            ),
            SchemaError::InvalidType(name) => format!(
                "Invalid column type: {name}\n\n\
                Hint: Use integer, decimal(p,s), timestamp, date, time, text or varchar(n)."
            ),
            _ => self.to_string(),
        }
    }
}

/// A single row rejected by validation (non-fatal, counted)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowValidationError {
    /// Non-nullable column has no value
    #[error("Row {row}: column '{column}' is required but empty")]
    MissingValue { row: usize, column: String },

    /// Value cannot be coerced to the column type
    #[error("Row {row}: column '{column}' value '{value}' is not a valid {expected}: {reason}")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
        expected: String,
        reason: String,
    },

    /// Record could not be decoded at all
    #[error("Row {row}: {reason}")]
    Malformed { row: usize, reason: String },
}

impl RowValidationError {
    /// 1-based data row number
    pub fn row(&self) -> usize {
        match self {
            RowValidationError::MissingValue { row, .. }
            | RowValidationError::InvalidValue { row, .. }
            | RowValidationError::Malformed { row, .. } => *row,
        }
    }

    /// Offending target column, when one is known
    pub fn column(&self) -> Option<&str> {
        match self {
            RowValidationError::MissingValue { column, .. }
            | RowValidationError::InvalidValue { column, .. } => Some(column),
            RowValidationError::Malformed { .. } => None,
        }
    }
}
