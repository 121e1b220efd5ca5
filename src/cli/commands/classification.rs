//! Classification command implementation

use std::path::Path;

use lineage_ingest::catalog::{CatalogClient as _, CatalogError, ClassificationDef};

use super::load_config;
use crate::error::CliError;

/// Handle `classification create`
pub fn handle_create(config_path: &Path, name: &str, description: &str) -> Result<u8, CliError> {
    if name.trim().is_empty() {
        return Err(CliError::InvalidArgument(
            "classification name must not be empty".to_string(),
        ));
    }

    let config = load_config(config_path)?;
    let catalog = config.catalog.connect()?;

    match catalog.create_classification(&ClassificationDef::new(name, description)) {
        Ok(()) => println!("Created classification '{}'", name),
        Err(CatalogError::Conflict { .. }) => println!("Classification '{}' already exists", name),
        Err(e) => return Err(e.into()),
    }
    Ok(0)
}
