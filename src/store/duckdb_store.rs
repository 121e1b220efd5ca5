//! DuckDB target store

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::error::{RowErrorKind, RowWriteError, StoreError};
use super::loader::{ContainerHandle, TargetStore};
use super::run::{LoadRun, LoadStatus};
use crate::schema::{TargetSchema, ValidatedRow};
use crate::source::Value;

/// Internal ledger of load runs
pub const LOAD_RUNS_TABLE: &str = "_lineage_load_runs";

const CREATE_LOAD_RUNS: &str = "
CREATE TABLE IF NOT EXISTS _lineage_load_runs (
    run_id VARCHAR PRIMARY KEY,
    pipeline VARCHAR NOT NULL,
    source VARCHAR NOT NULL,
    target VARCHAR NOT NULL,
    content_hash VARCHAR,
    operator VARCHAR NOT NULL,
    rows_attempted BIGINT NOT NULL,
    rows_succeeded BIGINT NOT NULL,
    rows_failed BIGINT NOT NULL,
    rows_rejected BIGINT NOT NULL,
    first_error VARCHAR,
    status VARCHAR NOT NULL,
    started_at VARCHAR NOT NULL,
    finished_at VARCHAR NOT NULL
);
";

const SELECT_LOAD_RUNS: &str = "
SELECT run_id, pipeline, source, target, content_hash, operator,
       rows_attempted, rows_succeeded, rows_failed, rows_rejected,
       first_error, status, started_at, finished_at
FROM _lineage_load_runs";

/// Target store backed by an embedded DuckDB database
pub struct DuckDbStore {
    conn: duckdb::Connection,
    path: Option<String>,
}

impl DuckDbStore {
    /// Open or create a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = duckdb::Connection::open(path)?;
        let store = Self {
            conn,
            path: Some(path.display().to_string()),
        };
        store.init()?;
        info!(path = %path.display(), "Opened DuckDB store");
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn memory() -> Result<Self, StoreError> {
        let conn = duckdb::Connection::open_in_memory()?;
        let store = Self { conn, path: None };
        store.init()?;
        Ok(store)
    }

    /// Database path (if not in-memory)
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    fn init(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(CREATE_LOAD_RUNS)?;
        Ok(())
    }

    fn database_name(&self) -> String {
        self.path
            .as_deref()
            .and_then(|p| Path::new(p).file_stem())
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "memory".to_string())
    }

    /// Existing columns as (name, type, nullable); empty when the table is absent
    fn describe_table(&self, name: &str) -> Result<Vec<(String, String, bool)>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT column_name, data_type, is_nullable
             FROM information_schema.columns
             WHERE table_schema = 'main' AND lower(table_name) = lower(?)
             ORDER BY ordinal_position",
        )?;
        let rows = stmt.query_map([name], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)? == "YES",
            ))
        })?;

        let mut columns = Vec::new();
        for row in rows {
            columns.push(row?);
        }
        Ok(columns)
    }

    fn primary_key_columns(&self, name: &str) -> Result<HashSet<String>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT unnest(constraint_column_names)
             FROM duckdb_constraints()
             WHERE schema_name = 'main' AND lower(table_name) = lower(?)
               AND constraint_type = 'PRIMARY KEY'",
        )?;
        let rows = stmt.query_map([name], |row| row.get::<_, String>(0))?;

        let mut columns = HashSet::new();
        for row in rows {
            columns.insert(row?.to_lowercase());
        }
        Ok(columns)
    }
}

/// Quote a table or column name, rejecting anything but plain identifiers
fn quote_ident(name: &str) -> Result<String, StoreError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(StoreError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{}\"", name))
}

fn create_table_sql(name: &str, schema: &TargetSchema) -> Result<String, StoreError> {
    let mut lines = Vec::with_capacity(schema.len() + 1);
    for column in &schema.columns {
        let mut line = format!(
            "    {} {}",
            quote_ident(&column.name)?,
            column.semantic_type.ddl()
        );
        if column.is_required() {
            line.push_str(" NOT NULL");
        }
        lines.push(line);
    }

    let key = schema
        .primary_key()
        .into_iter()
        .map(quote_ident)
        .collect::<Result<Vec<_>, _>>()?;
    lines.push(format!("    PRIMARY KEY ({})", key.join(", ")));

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n);",
        quote_ident(name)?,
        lines.join(",\n")
    ))
}

fn check_compatible(
    name: &str,
    schema: &TargetSchema,
    existing: &[(String, String, bool)],
    existing_key: &HashSet<String>,
) -> Result<(), StoreError> {
    let conflict = |reason: String| StoreError::ContainerConflict {
        container: name.to_string(),
        reason,
    };

    for column in &schema.columns {
        let Some((_, store_type, _)) = existing
            .iter()
            .find(|(n, _, _)| n.eq_ignore_ascii_case(&column.name))
        else {
            return Err(conflict(format!("column '{}' does not exist", column.name)));
        };
        if !column.semantic_type.accepts_store_type(store_type) {
            return Err(conflict(format!(
                "column '{}' is {} but the schema expects {}",
                column.name,
                store_type,
                column.semantic_type.ddl()
            )));
        }
    }

    for (column, _, nullable) in existing {
        if !nullable && schema.columns.iter().all(|c| !c.name.eq_ignore_ascii_case(column)) {
            return Err(conflict(format!(
                "NOT NULL column '{}' is not part of the schema",
                column
            )));
        }
    }

    let expected_key: HashSet<String> = schema
        .primary_key()
        .iter()
        .map(|c| c.to_lowercase())
        .collect();
    if &expected_key != existing_key {
        let mut found: Vec<_> = existing_key.iter().cloned().collect();
        found.sort();
        return Err(conflict(format!(
            "primary key is ({}) but the schema expects ({})",
            found.join(", "),
            schema.primary_key().join(", ")
        )));
    }

    Ok(())
}

fn bind_value(value: &Value) -> duckdb::types::Value {
    match value {
        Value::Null => duckdb::types::Value::Null,
        Value::Integer(i) => duckdb::types::Value::BigInt(*i),
        // DuckDB casts canonical text into DECIMAL/TIMESTAMP/DATE/TIME columns
        other => duckdb::types::Value::Text(other.to_string()),
    }
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Decode a ledger row; the outer error is DuckDB's, the inner one a bad record
fn run_from_row(row: &duckdb::Row<'_>) -> duckdb::Result<Result<LoadRun, StoreError>> {
    let run_id: String = row.get(0)?;
    let status: String = row.get(11)?;
    let started_at: String = row.get(12)?;
    let finished_at: String = row.get(13)?;

    let corrupt =
        |field: &str, value: &str| StoreError::CorruptRun(format!("run {run_id}: {field} '{value}'"));
    let Ok(status) = status.parse::<LoadStatus>() else {
        return Ok(Err(corrupt("status", &status)));
    };
    let Some(started) = parse_time(&started_at) else {
        return Ok(Err(corrupt("started_at", &started_at)));
    };
    let Some(finished) = parse_time(&finished_at) else {
        return Ok(Err(corrupt("finished_at", &finished_at)));
    };

    Ok(Ok(LoadRun {
        run_id,
        pipeline: row.get(1)?,
        source: row.get(2)?,
        target: row.get(3)?,
        content_hash: row.get(4)?,
        operator: row.get(5)?,
        rows_attempted: row.get(6)?,
        rows_succeeded: row.get(7)?,
        rows_failed: row.get(8)?,
        rows_rejected: row.get(9)?,
        first_error: row.get(10)?,
        status,
        started_at: started,
        finished_at: finished,
    }))
}

impl TargetStore for DuckDbStore {
    fn ensure_container(
        &self,
        name: &str,
        schema: &TargetSchema,
    ) -> Result<ContainerHandle, StoreError> {
        schema
            .validate()
            .map_err(|e| StoreError::ContainerConflict {
                container: name.to_string(),
                reason: e.to_string(),
            })?;

        let existing = self.describe_table(name)?;
        if existing.is_empty() {
            let ddl = create_table_sql(name, schema)?;
            debug!(ddl = %ddl, "Creating container");
            self.conn.execute_batch(&ddl)?;
            info!(table = name, columns = schema.len(), "Created container");
        } else {
            let key = self.primary_key_columns(name)?;
            check_compatible(name, schema, &existing, &key)?;
            debug!(table = name, "Existing container is compatible");
        }

        let columns = schema.column_names().iter().map(|c| c.to_string()).collect();
        Ok(ContainerHandle::new(
            name,
            format!("{}.main.{}", self.database_name(), name),
            columns,
        ))
    }

    fn insert_row(
        &self,
        container: &ContainerHandle,
        row: &ValidatedRow,
    ) -> Result<(), RowWriteError> {
        if row.values.len() != container.columns().len() {
            return Err(RowWriteError {
                row: row.index,
                kind: RowErrorKind::TypeMismatch,
                message: format!(
                    "expected {} values, got {}",
                    container.columns().len(),
                    row.values.len()
                ),
            });
        }

        let quoted = |name: &str| {
            quote_ident(name).map_err(|e| RowWriteError::from_message(row.index, e.to_string()))
        };
        let columns = container
            .columns()
            .iter()
            .map(|c| quoted(c.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quoted(container.name())?,
            columns.join(", "),
            placeholders
        );

        self.conn
            .execute(&sql, duckdb::params_from_iter(row.values.iter().map(bind_value)))
            .map_err(|e| RowWriteError::from_message(row.index, e.to_string()))?;
        Ok(())
    }

    fn row_count(&self, name: &str) -> Result<u64, StoreError> {
        if self.describe_table(name)?.is_empty() {
            return Ok(0);
        }
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(name)?);
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn record_run(&self, run: &LoadRun) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO _lineage_load_runs
             (run_id, pipeline, source, target, content_hash, operator,
              rows_attempted, rows_succeeded, rows_failed, rows_rejected,
              first_error, status, started_at, finished_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            duckdb::params![
                run.run_id,
                run.pipeline,
                run.source,
                run.target,
                run.content_hash.as_deref(),
                run.operator,
                run.rows_attempted,
                run.rows_succeeded,
                run.rows_failed,
                run.rows_rejected,
                run.first_error.as_deref(),
                run.status.to_string(),
                run.started_at.to_rfc3339(),
                run.finished_at.to_rfc3339(),
            ],
        )?;
        debug!(run_id = %run.run_id, "Recorded load run");
        Ok(())
    }

    fn latest_completed_run(&self, pipeline: &str) -> Result<Option<LoadRun>, StoreError> {
        let sql = format!(
            "{SELECT_LOAD_RUNS} WHERE pipeline = ?1 AND status = ?2 \
             ORDER BY started_at DESC, finished_at DESC LIMIT 1"
        );
        let completed = LoadStatus::Completed.to_string();
        match self
            .conn
            .query_row(&sql, [pipeline, completed.as_str()], run_from_row)
        {
            Ok(run) => run.map(Some),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_runs(&self, limit: usize) -> Result<Vec<LoadRun>, StoreError> {
        let sql =
            format!("{SELECT_LOAD_RUNS} ORDER BY started_at DESC, finished_at DESC LIMIT ?1");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([limit as i64], run_from_row)?;

        let mut runs = Vec::new();
        for row in rows {
            runs.push(row??);
        }
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDef, SemanticType};
    use crate::store::BulkLoader;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn schema() -> TargetSchema {
        TargetSchema::new(vec![
            ColumnDef::new("txn_id", SemanticType::Integer).primary_key(),
            ColumnDef::new(
                "amount",
                SemanticType::Decimal {
                    precision: 10,
                    scale: 2,
                },
            ),
            ColumnDef::new("note", SemanticType::Text { max_len: None }),
        ])
        .unwrap()
    }

    fn row(index: usize, id: i64, amount: &str) -> ValidatedRow {
        ValidatedRow {
            index,
            values: vec![
                Value::Integer(id),
                Value::Decimal(Decimal::from_str(amount).unwrap()),
                Value::Null,
            ],
        }
    }

    #[test]
    fn test_ensure_container_is_idempotent() {
        let store = DuckDbStore::memory().unwrap();
        let first = store.ensure_container("orders", &schema()).unwrap();
        let second = store.ensure_container("orders", &schema()).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.identifier(), "memory.main.orders");
        assert_eq!(store.row_count("orders").unwrap(), 0);
    }

    #[test]
    fn test_container_with_other_primary_key_conflicts() {
        let store = DuckDbStore::memory().unwrap();
        store
            .conn
            .execute_batch(
                "CREATE TABLE orders (txn_id BIGINT, amount DECIMAL(10,2), note VARCHAR, \
                 PRIMARY KEY (txn_id, note));",
            )
            .unwrap();

        let err = store.ensure_container("orders", &schema()).unwrap_err();
        assert!(matches!(err, StoreError::ContainerConflict { .. }));
        assert!(err.to_string().contains("primary key"));
    }

    #[test]
    fn test_container_with_other_column_type_conflicts() {
        let store = DuckDbStore::memory().unwrap();
        store
            .conn
            .execute_batch(
                "CREATE TABLE orders (txn_id BIGINT PRIMARY KEY, amount DOUBLE, note VARCHAR);",
            )
            .unwrap();

        let err = store.ensure_container("orders", &schema()).unwrap_err();
        assert!(err.to_string().contains("amount"));
    }

    #[test]
    fn test_invalid_identifier_is_rejected() {
        let store = DuckDbStore::memory().unwrap();
        let err = store
            .ensure_container("orders; DROP TABLE x", &schema())
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidIdentifier(_)));
    }

    #[test]
    fn test_duplicate_key_and_exact_decimals() {
        let store = DuckDbStore::memory().unwrap();
        let loader = BulkLoader::new(&store);
        let container = loader.ensure_container("orders", &schema()).unwrap();

        let result = loader.load(
            &container,
            vec![row(1, 1, "10.25"), row(2, 2, "0.10"), row(3, 1, "99.99")],
        );

        assert_eq!(result.rows_succeeded, 2);
        assert_eq!(result.rows_failed, 1);
        assert_eq!(
            result.first_error.as_ref().unwrap().kind,
            RowErrorKind::ConstraintViolation
        );

        let amount: String = store
            .conn
            .query_row(
                "SELECT CAST(amount AS VARCHAR) FROM orders WHERE txn_id = 1",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(amount, "10.25");
    }

    #[test]
    fn test_type_mismatch_is_classified() {
        let store = DuckDbStore::memory().unwrap();
        let container = store.ensure_container("orders", &schema()).unwrap();

        let bad = ValidatedRow {
            index: 4,
            values: vec![Value::Text("abc".to_string()), Value::Null, Value::Null],
        };
        let err = store.insert_row(&container, &bad).unwrap_err();
        assert_eq!(err.row, 4);
        assert_eq!(err.kind, RowErrorKind::TypeMismatch);
    }

    #[test]
    fn test_row_count_of_missing_table_is_zero() {
        let store = DuckDbStore::memory().unwrap();
        assert_eq!(store.row_count("nothing_here").unwrap(), 0);
    }

    #[test]
    fn test_load_run_ledger() {
        let store = DuckDbStore::memory().unwrap();
        let loader = BulkLoader::new(&store);
        let container = loader.ensure_container("orders", &schema()).unwrap();
        let result = loader.load(&container, vec![row(1, 1, "1.00")]);

        let first = LoadRun::from_result("run-1", "daily", "/data/in.csv", "ops", &result);
        store.record_run(&first).unwrap();

        let mut second = first.clone();
        second.run_id = "run-2".to_string();
        second.started_at = first.started_at + chrono::Duration::seconds(5);
        store.record_run(&second).unwrap();

        let latest = store.latest_completed_run("daily").unwrap().unwrap();
        assert_eq!(latest.run_id, "run-2");
        assert_eq!(latest.rows_succeeded, 1);
        assert_eq!(latest.status, LoadStatus::Completed);
        assert!(store.latest_completed_run("weekly").unwrap().is_none());

        let runs = store.list_runs(10).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1].run_id, "run-1");
    }

    #[test]
    fn test_latest_completed_run_skips_stopped_loads() {
        let store = DuckDbStore::memory().unwrap();
        let loader = BulkLoader::new(&store);
        let container = loader.ensure_container("orders", &schema()).unwrap();
        let result = loader.load(&container, vec![row(1, 1, "1.00")]);

        let completed = LoadRun::from_result("run-1", "daily", "/data/in.csv", "ops", &result);
        store.record_run(&completed).unwrap();

        let mut cancelled = completed.clone();
        cancelled.run_id = "run-2".to_string();
        cancelled.status = LoadStatus::Cancelled;
        cancelled.started_at = completed.started_at + chrono::Duration::seconds(5);
        store.record_run(&cancelled).unwrap();

        let latest = store.latest_completed_run("daily").unwrap().unwrap();
        assert_eq!(latest.run_id, "run-1");
        assert_eq!(store.list_runs(1).unwrap()[0].run_id, "run-2");
    }

    #[test]
    fn test_unreadable_ledger_row_is_reported() {
        let store = DuckDbStore::memory().unwrap();
        store
            .conn
            .execute_batch(
                "INSERT INTO _lineage_load_runs VALUES
                 ('run-x', 'daily', '/data/in.csv', 'orders', NULL, 'ops',
                  1, 1, 0, 0, NULL, 'exploded', '2024-03-01T09:00:00+00:00',
                  '2024-03-01T09:00:01+00:00')",
            )
            .unwrap();

        let err = store.list_runs(5).unwrap_err();
        assert!(matches!(err, StoreError::CorruptRun(ref msg) if msg.contains("exploded")));
    }

    #[test]
    fn test_rows_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warehouse.duckdb");

        {
            let store = DuckDbStore::open(&path).unwrap();
            let container = store.ensure_container("orders", &schema()).unwrap();
            store.insert_row(&container, &row(1, 7, "3.50")).unwrap();
        }

        let store = DuckDbStore::open(&path).unwrap();
        let container = store.ensure_container("orders", &schema()).unwrap();
        assert_eq!(container.identifier(), "warehouse.main.orders");
        assert_eq!(store.row_count("orders").unwrap(), 1);
    }
}
