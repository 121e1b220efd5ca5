//! Error types for the target store and bulk loader

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Store errors that stop a load (fatal, not retried)
#[derive(Error, Debug)]
pub enum StoreError {
    /// Existing container does not match the target schema
    #[error("Container '{container}' conflicts with the target schema: {reason}")]
    ContainerConflict { container: String, reason: String },

    /// Table or column name that cannot be used as an identifier
    #[error("Invalid identifier '{0}'")]
    InvalidIdentifier(String),

    /// Store cannot be reached or failed outside a row write
    #[error("Store connection error: {0}")]
    Connection(String),

    /// Load-run ledger row could not be decoded
    #[error("Corrupt load-run record: {0}")]
    CorruptRun(String),
}

#[cfg(feature = "duckdb-backend")]
impl From<duckdb::Error> for StoreError {
    fn from(err: duckdb::Error) -> Self {
        StoreError::Connection(err.to_string())
    }
}

impl StoreError {
    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            StoreError::ContainerConflict { container, reason } => format!(
                "Table '{container}' already exists with an incompatible schema: {reason}\n\n\
                Hint: Load into a new table, or align [schema] with the existing table."
            ),
            StoreError::InvalidIdentifier(name) => format!(
                "'{name}' is not a valid table or column name\n\n\
                Hint: Use letters, digits and underscores, starting with a letter or underscore."
            ),
            StoreError::Connection(msg) if msg.to_lowercase().contains("lock") => format!(
                "Could not use the target store: {msg}\n\n\
                Hint: DuckDB allows one process per database file. Wait for the other run to \
                finish, or give each concurrent pipeline its own store.database_path."
            ),
            StoreError::Connection(msg) => format!(
                "Could not use the target store: {msg}\n\n\
                Hint: Check store.database_path and that no other process holds the database lock."
            ),
            StoreError::CorruptRun(msg) => format!(
                "Unreadable load-run record: {msg}\n\n\
                Hint: The _lineage_load_runs table was changed outside lineage-ingest."
            ),
        }
    }
}

/// Message fragments of DuckDB errors that leave the database unusable
const CONNECTION_MARKERS: &[&str] = &[
    "io error",
    "connection",
    "could not set lock",
    "conflicting lock",
    "database has been invalidated",
    "fatal error",
    "out of memory",
];

/// Class of a failed row write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowErrorKind {
    /// Store unreachable; further writes are pointless
    Connection,
    /// Primary key, NOT NULL or other constraint violated
    ConstraintViolation,
    /// Value rejected by the column type
    TypeMismatch,
    /// Any other refusal scoped to the row
    Rejected,
}

impl std::fmt::Display for RowErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowErrorKind::Connection => write!(f, "connection"),
            RowErrorKind::ConstraintViolation => write!(f, "constraint violation"),
            RowErrorKind::TypeMismatch => write!(f, "type mismatch"),
            RowErrorKind::Rejected => write!(f, "rejected"),
        }
    }
}

impl RowErrorKind {
    /// Classify a store error message
    ///
    /// Only messages that show the store itself is unusable count as
    /// `Connection`; anything unrecognised stays local to the row.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if CONNECTION_MARKERS.iter().any(|m| lower.contains(m)) {
            RowErrorKind::Connection
        } else if lower.contains("constraint") || lower.contains("duplicate key") {
            RowErrorKind::ConstraintViolation
        } else if lower.contains("conversion error")
            || lower.contains("mismatch type")
            || lower.contains("could not convert")
            || lower.contains("out of range")
            || lower.contains("invalid input")
        {
            RowErrorKind::TypeMismatch
        } else {
            RowErrorKind::Rejected
        }
    }
}

/// A single row the store refused (non-fatal, counted)
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("Row {row}: {kind}: {message}")]
pub struct RowWriteError {
    /// 1-based data row number in the input
    pub row: usize,
    pub kind: RowErrorKind,
    pub message: String,
}

impl RowWriteError {
    /// Create an error, classifying it from the store message
    pub fn from_message(row: usize, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            row,
            kind: RowErrorKind::classify(&message),
            message,
        }
    }
}
