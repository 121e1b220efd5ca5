//! Command implementations

pub mod classification;
pub mod register;
pub mod run;
pub mod runs;

use std::path::Path;

use lineage_ingest::pipeline::PipelineConfig;
use lineage_ingest::store::DuckDbStore;

use crate::error::CliError;

/// Load and validate a pipeline configuration file
pub fn load_config(path: &Path) -> Result<PipelineConfig, CliError> {
    if !path.exists() {
        return Err(CliError::ConfigNotFound(path.to_path_buf()));
    }
    Ok(PipelineConfig::from_file(path)?)
}

/// Open the configured store
pub fn open_store(config: &PipelineConfig) -> Result<DuckDbStore, CliError> {
    Ok(DuckDbStore::open(&config.store.database_path)?)
}
