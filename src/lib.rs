//! Lineage Ingest - bulk CSV ingestion with lineage registration
//!
//! Provides:
//! - Streaming delimited-text row sources
//! - Schema validation and type coercion against a target schema
//! - Row-isolated bulk loading into a target store (DuckDB backend)
//! - A metadata catalog client (Apache Atlas REST, in-memory)
//! - Idempotent get-or-create entity resolution
//! - Lineage registration: source -> process -> table
//! - Pipeline runs tying the stages together

pub mod catalog;
pub mod lineage;
pub mod pipeline;
pub mod schema;
pub mod source;
pub mod store;

// Re-export commonly used types
pub use source::{CsvOptions, CsvRowSource, Record, SourceReadError, Value};

pub use schema::{
    ColumnDef, ColumnMapping, RowValidationError, SchemaError, SchemaValidator, SemanticType,
    TargetSchema, ValidatedRow,
};

pub use store::{
    BulkLoader, ContainerHandle, LoadResult, LoadRun, LoadStatus, RowErrorKind, RowWriteError,
    StoreError, TargetStore,
};
#[cfg(feature = "duckdb-backend")]
pub use store::DuckDbStore;

pub use catalog::{
    CatalogClient, CatalogEntity, CatalogError, EntityRef, EntityResolver, InMemoryCatalog,
    Resolved, RetryPolicy,
};
#[cfg(feature = "atlas-client")]
pub use catalog::{AtlasClient, CatalogCredentials};

pub use lineage::{
    CatalogTypes, LineageNames, LineageRegistrar, LineageReport, RunMetadata, SourceArtifact,
    TargetTable,
};

pub use pipeline::{
    PipelineConfig, PipelineError, PipelineExecutor, PipelineResult, RunStatus, RunSummary,
};
