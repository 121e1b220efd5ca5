//! Register command implementation

use std::path::Path;

use lineage_ingest::pipeline::PipelineExecutor;

use super::{load_config, open_store};
use crate::error::CliError;
use crate::output::summary_json;

/// Handle the register command; returns the process exit code
pub fn handle_register(config_path: &Path, json: bool) -> Result<u8, CliError> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;
    let catalog = config.catalog.connect()?;

    let summary = PipelineExecutor::new(config, &store, &catalog)?.register_latest()?;

    if json {
        println!("{}", summary_json(&summary)?);
    } else {
        print!("{}", summary.render());
    }
    Ok(summary.exit_code())
}
