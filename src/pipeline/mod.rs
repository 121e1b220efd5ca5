//! Pipeline runs
//!
//! Sequences the stages of one logical pipeline: Row Source -> Schema
//! Validator -> Bulk Loader, then Lineage Registrar once the load has
//! finished. Every run ends in a [`RunSummary`] with status `success`,
//! `partial` (loaded, lineage incomplete) or `failed` (ingestion aborted).

mod config;
mod error;
mod executor;
mod summary;

pub use config::{
    CatalogConfig, ENV_CATALOG_PASSWORD, ENV_CATALOG_URL, ENV_CATALOG_USER, PipelineConfig,
    PipelineSection, SourceConfig, StoreConfig,
};
pub use error::{PipelineError, PipelineResult};
pub use executor::PipelineExecutor;
pub use summary::{IngestSummary, RunStatus, RunSummary};
