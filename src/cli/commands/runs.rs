//! Runs command implementation

use std::path::Path;

use lineage_ingest::store::TargetStore as _;

use super::{load_config, open_store};
use crate::error::CliError;
use crate::output::format_runs;

/// Handle the runs command
pub fn handle_runs(config_path: &Path, limit: usize) -> Result<u8, CliError> {
    if limit == 0 {
        return Err(CliError::InvalidArgument(
            "--limit must be at least 1".to_string(),
        ));
    }

    let config = load_config(config_path)?;
    let store = open_store(&config)?;
    let runs = store.list_runs(limit)?;

    print!("{}", format_runs(&runs));
    Ok(0)
}
