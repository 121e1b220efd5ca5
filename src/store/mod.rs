//! Target store and bulk loader
//!
//! [`BulkLoader`] writes validated rows through a [`TargetStore`] with
//! row-level isolation: each row is its own atomic write, failures are
//! counted in the [`LoadResult`] and never abort the batch. Duplicate primary
//! keys are ordinary row failures, which makes re-runs safe.
//!
//! Every load is also appended to the store's load-run ledger ([`LoadRun`])
//! so the lineage stage can be repeated without reloading.

mod error;
mod loader;
mod run;

#[cfg(feature = "duckdb-backend")]
mod duckdb_store;

#[cfg(feature = "cli")]
pub mod progress;

pub use error::{RowErrorKind, RowWriteError, StoreError};
pub use loader::{BulkLoader, ContainerHandle, LoadProgress, LoadResult, TargetStore};
pub use run::{LoadRun, LoadStatus};

#[cfg(feature = "duckdb-backend")]
pub use duckdb_store::{DuckDbStore, LOAD_RUNS_TABLE};
