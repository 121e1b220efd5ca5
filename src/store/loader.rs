//! Bulk loader with row-level isolation

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use super::error::{RowErrorKind, RowWriteError, StoreError};
use super::run::{LoadRun, LoadStatus};
use crate::schema::{MAX_RETAINED_ERRORS, TargetSchema, ValidatedRow};

/// A target store: container management, row writes and the load-run ledger
///
/// Every `insert_row` must be atomic and committed on return, so a crash
/// mid-load leaves only whole rows behind.
pub trait TargetStore {
    /// Create the container if absent, or verify an existing one matches
    fn ensure_container(
        &self,
        name: &str,
        schema: &TargetSchema,
    ) -> Result<ContainerHandle, StoreError>;

    /// Write one row
    fn insert_row(
        &self,
        container: &ContainerHandle,
        row: &ValidatedRow,
    ) -> Result<(), RowWriteError>;

    /// Rows currently in a container (0 when it does not exist)
    fn row_count(&self, name: &str) -> Result<u64, StoreError>;

    /// Append a load-run record
    fn record_run(&self, run: &LoadRun) -> Result<(), StoreError>;

    /// Most recent completed load-run record for a pipeline
    fn latest_completed_run(&self, pipeline: &str) -> Result<Option<LoadRun>, StoreError>;

    /// Most recent load-run records, newest first
    fn list_runs(&self, limit: usize) -> Result<Vec<LoadRun>, StoreError>;
}

/// A verified target container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    name: String,
    identifier: String,
    columns: Vec<String>,
}

impl ContainerHandle {
    /// Create a handle; `identifier` is the store-qualified name
    pub fn new(name: impl Into<String>, identifier: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            identifier: identifier.into(),
            columns,
        }
    }

    /// Container (table) name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store-qualified identifier
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Column names in schema order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

/// Outcome of a load; fixed once [`BulkLoader::load`] returns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadResult {
    pub target_identifier: String,
    pub rows_attempted: usize,
    pub rows_succeeded: usize,
    pub rows_failed: usize,
    /// First failed write
    pub first_error: Option<RowWriteError>,
    /// Failed writes, capped at [`MAX_RETAINED_ERRORS`]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<RowWriteError>,
    pub status: LoadStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl LoadResult {
    fn start(target_identifier: &str) -> Self {
        let now = Utc::now();
        Self {
            target_identifier: target_identifier.to_string(),
            rows_attempted: 0,
            rows_succeeded: 0,
            rows_failed: 0,
            first_error: None,
            errors: Vec::new(),
            status: LoadStatus::Completed,
            started_at: now,
            finished_at: now,
        }
    }

    fn add_error(&mut self, error: RowWriteError) {
        self.rows_failed += 1;
        if self.first_error.is_none() {
            self.first_error = Some(error.clone());
        }
        if self.errors.len() < MAX_RETAINED_ERRORS {
            self.errors.push(error);
        }
    }

    /// Rebuild a result from a ledger record
    pub fn from_run(run: &LoadRun) -> Self {
        Self {
            target_identifier: run.target.clone(),
            rows_attempted: run.rows_attempted.max(0) as usize,
            rows_succeeded: run.rows_succeeded.max(0) as usize,
            rows_failed: run.rows_failed.max(0) as usize,
            first_error: run.first_error.as_ref().map(|message| RowWriteError {
                row: 0,
                kind: RowErrorKind::classify(message),
                message: message.clone(),
            }),
            errors: Vec::new(),
            status: run.status,
            started_at: run.started_at,
            finished_at: run.finished_at,
        }
    }

    /// Mark a load whose input stream failed part way
    pub fn into_aborted(mut self) -> Self {
        self.status = LoadStatus::Aborted;
        self
    }

    /// Whether the load attempted its whole input
    pub fn is_complete(&self) -> bool {
        self.status == LoadStatus::Completed
    }

    /// Whether the load was cancelled between rows
    pub fn cancelled(&self) -> bool {
        self.status == LoadStatus::Cancelled
    }
}

/// Running counts handed to a progress callback
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadProgress {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Writes validated rows into a container one atomic row at a time
pub struct BulkLoader<'s, S: TargetStore + ?Sized> {
    store: &'s S,
    cancel: Option<Arc<AtomicBool>>,
    log_interval: usize,
}

impl<'s, S: TargetStore + ?Sized> BulkLoader<'s, S> {
    /// Create a loader over a store
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            cancel: None,
            log_interval: 1000,
        }
    }

    /// Log running counts every `rows` rows (0 disables)
    pub fn with_log_interval(mut self, rows: usize) -> Self {
        self.log_interval = rows;
        self
    }

    /// Stop between rows once `flag` is set
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Create-if-absent the container; an incompatible one is fatal
    pub fn ensure_container(
        &self,
        name: &str,
        schema: &TargetSchema,
    ) -> Result<ContainerHandle, StoreError> {
        let handle = self.store.ensure_container(name, schema)?;
        debug!(container = %handle.identifier(), "Container ready");
        Ok(handle)
    }

    /// Write rows; failures are counted per row and never abort the batch
    pub fn load<I>(&self, container: &ContainerHandle, rows: I) -> LoadResult
    where
        I: IntoIterator<Item = ValidatedRow>,
    {
        self.load_with_progress(container, rows, |_| {})
    }

    /// [`BulkLoader::load`] with a callback after each row
    pub fn load_with_progress<I, F>(
        &self,
        container: &ContainerHandle,
        rows: I,
        mut on_progress: F,
    ) -> LoadResult
    where
        I: IntoIterator<Item = ValidatedRow>,
        F: FnMut(&LoadProgress),
    {
        let span = info_span!("load", container = %container.identifier());
        let _guard = span.enter();

        let mut result = LoadResult::start(container.identifier());
        let mut progress = LoadProgress::default();

        for row in rows {
            if self.is_cancelled() {
                info!(attempted = result.rows_attempted, "Load cancelled between rows");
                result.status = LoadStatus::Cancelled;
                break;
            }

            result.rows_attempted += 1;
            match self.store.insert_row(container, &row) {
                Ok(()) => result.rows_succeeded += 1,
                Err(e) => {
                    debug!(row = e.row, kind = %e.kind, error = %e.message, "Row write failed");
                    let fatal = e.kind == RowErrorKind::Connection;
                    result.add_error(e);
                    if fatal {
                        warn!("Store connection lost, stopping load");
                        result.status = LoadStatus::Aborted;
                        break;
                    }
                }
            }

            if self.log_interval > 0 && result.rows_attempted % self.log_interval == 0 {
                info!(
                    attempted = result.rows_attempted,
                    failed = result.rows_failed,
                    "Load progress"
                );
            }

            progress.attempted = result.rows_attempted;
            progress.succeeded = result.rows_succeeded;
            progress.failed = result.rows_failed;
            on_progress(&progress);
        }

        result.finished_at = Utc::now();
        info!(
            attempted = result.rows_attempted,
            succeeded = result.rows_succeeded,
            failed = result.rows_failed,
            status = %result.status,
            "Load finished"
        );
        result
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDef, SemanticType};
    use crate::source::Value;
    use std::cell::RefCell;
    use std::collections::HashSet;

    /// Store accepting each integer key once
    #[derive(Default)]
    struct KeyedStore {
        keys: RefCell<HashSet<i64>>,
        fail_connection_at: Option<usize>,
        fail_unknown_at: Option<usize>,
    }

    impl TargetStore for KeyedStore {
        fn ensure_container(
            &self,
            name: &str,
            schema: &TargetSchema,
        ) -> Result<ContainerHandle, StoreError> {
            let columns = schema.column_names().iter().map(|c| c.to_string()).collect();
            Ok(ContainerHandle::new(name, name, columns))
        }

        fn insert_row(
            &self,
            _container: &ContainerHandle,
            row: &ValidatedRow,
        ) -> Result<(), RowWriteError> {
            if self.fail_connection_at == Some(row.index) {
                return Err(RowWriteError::from_message(row.index, "IO Error: disk gone"));
            }
            if self.fail_unknown_at == Some(row.index) {
                return Err(RowWriteError::from_message(
                    row.index,
                    "Binder Error: unexpected value for this row",
                ));
            }
            let Value::Integer(key) = row.values[0] else {
                return Err(RowWriteError::from_message(row.index, "Conversion Error"));
            };
            if self.keys.borrow_mut().insert(key) {
                Ok(())
            } else {
                Err(RowWriteError::from_message(
                    row.index,
                    "Constraint Error: Duplicate key",
                ))
            }
        }

        fn row_count(&self, _name: &str) -> Result<u64, StoreError> {
            Ok(self.keys.borrow().len() as u64)
        }

        fn record_run(&self, _run: &LoadRun) -> Result<(), StoreError> {
            Ok(())
        }

        fn latest_completed_run(&self, _pipeline: &str) -> Result<Option<LoadRun>, StoreError> {
            Ok(None)
        }

        fn list_runs(&self, _limit: usize) -> Result<Vec<LoadRun>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn schema() -> TargetSchema {
        TargetSchema::new(vec![ColumnDef::new("id", SemanticType::Integer).primary_key()]).unwrap()
    }

    fn rows(keys: &[i64]) -> Vec<ValidatedRow> {
        keys.iter()
            .enumerate()
            .map(|(i, k)| ValidatedRow {
                index: i + 1,
                values: vec![Value::Integer(*k)],
            })
            .collect()
    }

    #[test]
    fn test_duplicate_key_is_a_row_failure() {
        let store = KeyedStore::default();
        let loader = BulkLoader::new(&store);
        let container = loader.ensure_container("orders", &schema()).unwrap();

        let result = loader.load(&container, rows(&[1, 2, 2, 3]));

        assert_eq!(result.rows_attempted, 4);
        assert_eq!(result.rows_succeeded, 3);
        assert_eq!(result.rows_failed, 1);
        let first = result.first_error.unwrap();
        assert_eq!(first.row, 3);
        assert_eq!(first.kind, RowErrorKind::ConstraintViolation);
        assert!(result.status == LoadStatus::Completed);
    }

    #[test]
    fn test_cancel_flag_stops_between_rows() {
        let store = KeyedStore::default();
        let flag = Arc::new(AtomicBool::new(false));
        let loader = BulkLoader::new(&store).with_cancel_flag(flag.clone());
        let container = loader.ensure_container("orders", &schema()).unwrap();

        let result = loader.load_with_progress(&container, rows(&[1, 2, 3, 4]), |p| {
            if p.attempted == 2 {
                flag.store(true, Ordering::SeqCst);
            }
        });

        assert!(result.cancelled());
        assert_eq!(result.rows_attempted, 2);
        assert_eq!(store.row_count("orders").unwrap(), 2);
    }

    #[test]
    fn test_connection_error_aborts() {
        let store = KeyedStore {
            fail_connection_at: Some(2),
            ..Default::default()
        };
        let loader = BulkLoader::new(&store);
        let container = loader.ensure_container("orders", &schema()).unwrap();

        let result = loader.load(&container, rows(&[1, 2, 3]));

        assert_eq!(result.status, LoadStatus::Aborted);
        assert_eq!(result.rows_succeeded, 1);
        assert_eq!(result.rows_failed, 1);
        assert!(!result.is_complete());
    }

    #[test]
    fn test_unrecognised_row_error_does_not_abort() {
        let store = KeyedStore {
            fail_unknown_at: Some(2),
            ..Default::default()
        };
        let loader = BulkLoader::new(&store);
        let container = loader.ensure_container("orders", &schema()).unwrap();

        let result = loader.load(&container, rows(&[1, 2, 3]));

        assert!(result.is_complete());
        assert_eq!(result.rows_succeeded, 2);
        assert_eq!(result.rows_failed, 1);
        assert_eq!(
            result.first_error.as_ref().map(|e| e.kind),
            Some(RowErrorKind::Rejected)
        );
    }

    #[test]
    fn test_retained_errors_are_capped() {
        let store = KeyedStore::default();
        let loader = BulkLoader::new(&store);
        let container = loader.ensure_container("orders", &schema()).unwrap();

        let keys = vec![7; MAX_RETAINED_ERRORS + 20];
        let result = loader.load(&container, rows(&keys));

        assert_eq!(result.rows_failed, MAX_RETAINED_ERRORS + 19);
        assert_eq!(result.errors.len(), MAX_RETAINED_ERRORS);
    }
}
