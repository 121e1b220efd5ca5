//! Run command implementation

use std::path::{Path, PathBuf};

use lineage_ingest::pipeline::{PipelineExecutor, RunStatus};
use lineage_ingest::store::progress::LoadProgressBar;

use super::{load_config, open_store};
use crate::error::CliError;
use crate::output::summary_json;

/// Handle the run command; returns the process exit code
pub fn handle_run(config_path: &Path, input: Option<PathBuf>, json: bool) -> Result<u8, CliError> {
    let mut config = load_config(config_path)?;
    if let Some(input) = input {
        config = config.with_input(input);
    }

    let store = open_store(&config)?;
    let catalog = config.catalog.connect()?;

    let progress = if json {
        LoadProgressBar::hidden()
    } else {
        LoadProgressBar::new(&config.store.table)
    };

    let executor = PipelineExecutor::new(config, &store, &catalog)?;
    let summary = executor.run_with_progress(|p| progress.update(p));

    match summary.status {
        RunStatus::Failed => progress.finish_error("Load failed"),
        _ => progress.finish_success("Load finished"),
    }

    if json {
        println!("{}", summary_json(&summary)?);
    } else {
        print!("{}", summary.render());
    }
    Ok(summary.exit_code())
}
