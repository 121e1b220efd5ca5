//! CLI error types

use std::path::PathBuf;

use lineage_ingest::catalog::CatalogError;
use lineage_ingest::pipeline::PipelineError;
use lineage_ingest::store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Failed to write output: {0}")]
    Output(#[from] anyhow::Error),
}

impl CliError {
    /// Message with hints for the terminal
    pub fn user_message(&self) -> String {
        match self {
            CliError::ConfigNotFound(path) => format!(
                "Configuration file not found: {}\n\n\
                Hint: Pass the pipeline TOML with --config.",
                path.display()
            ),
            CliError::Pipeline(e) => e.user_message(),
            CliError::Store(e) => e.user_message(),
            CliError::Catalog(e) => e.user_message(),
            _ => self.to_string(),
        }
    }
}
