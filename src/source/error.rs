//! Error types for reading tabular input

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading the tabular input
#[derive(Error, Debug)]
pub enum SourceReadError {
    /// Input file not found
    #[error("Input not found: {0}")]
    NotFound(PathBuf),

    /// Input has no header row
    #[error("Input is empty: {0}")]
    Empty(String),

    /// Header row cannot be used as a column schema
    #[error("Malformed input {input}: {reason}")]
    Malformed { input: String, reason: String },

    /// A single record could not be decoded
    #[error("Malformed record at row {row}: {reason}")]
    MalformedRecord { row: usize, reason: String },

    /// Input could not be read (I/O failure mid-stream)
    #[error("Failed to read {input}: {reason}")]
    Unreadable { input: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceReadError {
    /// Whether the failure is confined to one record
    ///
    /// Row-local failures are rejected like any other invalid row; everything
    /// else stops the read.
    pub fn is_row_local(&self) -> bool {
        matches!(self, SourceReadError::MalformedRecord { .. })
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            SourceReadError::NotFound(path) => format!(
                "Input not found: {}\n\nHint: Check that the file exists and the path is correct.",
                path.display()
            ),
            SourceReadError::Empty(input) => format!(
                "Input is empty: {input}\n\nHint: The file needs a header row naming its columns."
            ),
            SourceReadError::Malformed { input, reason } => format!(
                "Malformed input {input}: {reason}\n\nHint: Check the delimiter and the header row."
            ),
            _ => self.to_string(),
        }
    }
}
