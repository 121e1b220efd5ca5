//! Error types for pipeline runs
//!
//! Wraps the module errors so a run can report any failure with a
//! user-friendly message.

use std::path::PathBuf;
use thiserror::Error;

use crate::schema::SchemaError;
use crate::source::SourceReadError;
use crate::store::StoreError;

/// Errors that can occur during a pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Pipeline configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error with path context
    #[error("IO error with {path}: {message}")]
    IoWithPath {
        path: PathBuf,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Input could not be read
    #[error(transparent)]
    Source(#[from] SourceReadError),

    /// Input does not satisfy the target schema
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Target store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Load stopped before the end of the input
    #[error("Load into '{target}' stopped early: {reason}")]
    LoadIncomplete { target: String, reason: String },

    /// Nothing to register lineage for
    #[error("No completed load recorded for pipeline '{0}'")]
    NoLoadRecorded(String),
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    /// Create an IO error with path context
    pub fn io_with_path(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::IoWithPath {
            path: path.into(),
            message: message.into(),
            source,
        }
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Config(msg) => {
                format!(
                    "Configuration error: {msg}\n\nHint: Check your pipeline configuration file."
                )
            }
            PipelineError::IoWithPath { path, message, .. } => format!(
                "Failed {message} at {}\n\nHint: Check that the file exists and is readable.",
                path.display()
            ),
            PipelineError::Source(e) => e.user_message(),
            PipelineError::Schema(e) => e.user_message(),
            PipelineError::Store(e) => e.user_message(),
            PipelineError::LoadIncomplete { .. } => format!(
                "{self}\n\nHint: Rows already written are kept; re-run the pipeline to load the rest."
            ),
            PipelineError::NoLoadRecorded(name) => format!(
                "No completed load recorded for pipeline '{name}'\n\n\
                Hint: Run the pipeline with `run` before registering lineage."
            ),
        }
    }
}
