//! Schema validation: maps input records onto the target schema

use std::collections::HashSet;

use tracing::{debug, warn};

use super::error::{RowValidationError, SchemaError};
use super::mapping::ColumnMapping;
use super::target::{ColumnDef, TargetSchema};
use crate::source::{Record, SourceReadError, Value};

/// Maximum number of row errors retained for reporting
pub const MAX_RETAINED_ERRORS: usize = 100;

/// A row coerced to the target schema, values in schema column order
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRow {
    /// 1-based data row number in the input
    pub index: usize,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone)]
struct ColumnPlan {
    target: ColumnDef,
    input_position: Option<usize>,
    format: Option<String>,
}

/// Column plan binding a target schema to one input's columns
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    schema: TargetSchema,
    plan: Vec<ColumnPlan>,
}

impl SchemaValidator {
    /// Build the column plan
    ///
    /// Fails with [`SchemaError::SchemaMismatch`] when a required target
    /// column has no input column; nothing has been written at that point.
    pub fn new(
        schema: &TargetSchema,
        input_columns: &[String],
        mapping: &ColumnMapping,
        default_format: Option<&str>,
    ) -> Result<Self, SchemaError> {
        schema.validate()?;

        let mut mapped_targets = HashSet::new();
        for entry in &mapping.entries {
            if schema.column(&entry.target).is_none() {
                return Err(SchemaError::UnknownTargetColumn(entry.target.clone()));
            }
            if !mapped_targets.insert(entry.target.as_str()) {
                return Err(SchemaError::DuplicateMapping(entry.target.clone()));
            }
        }

        let mut plan = Vec::with_capacity(schema.len());
        let mut missing = Vec::new();

        for column in &schema.columns {
            let entry = mapping.for_target(&column.name);
            let source_name = entry.map_or(column.name.as_str(), |e| e.source.as_str());
            let input_position = find_column(input_columns, source_name);

            if input_position.is_none() {
                if column.is_required() {
                    missing.push(column.name.clone());
                } else {
                    warn!(
                        column = %column.name,
                        source = %source_name,
                        "Input has no column for nullable target column, filling with NULL"
                    );
                }
            }

            plan.push(ColumnPlan {
                target: column.clone(),
                input_position,
                format: entry
                    .and_then(|e| e.format.clone())
                    .or_else(|| default_format.map(str::to_string)),
            });
        }

        if !missing.is_empty() {
            return Err(SchemaError::SchemaMismatch { missing });
        }

        let used: HashSet<usize> = plan.iter().filter_map(|p| p.input_position).collect();
        for (i, name) in input_columns.iter().enumerate() {
            if !used.contains(&i) {
                debug!(column = %name, "Input column not mapped to target, ignoring");
            }
        }

        Ok(Self {
            schema: schema.clone(),
            plan,
        })
    }

    /// Target schema the plan was built for
    pub fn schema(&self) -> &TargetSchema {
        &self.schema
    }

    /// Coerce one record to the target schema
    pub fn validate(&self, record: &Record) -> Result<ValidatedRow, RowValidationError> {
        let mut values = Vec::with_capacity(self.plan.len());

        for column in &self.plan {
            let raw = column
                .input_position
                .and_then(|pos| record.get_index(pos))
                .unwrap_or(&Value::Null);

            let value = column
                .target
                .semantic_type
                .coerce(raw, column.format.as_deref())
                .map_err(|reason| RowValidationError::InvalidValue {
                    row: record.index,
                    column: column.target.name.clone(),
                    value: raw.to_string(),
                    expected: column.target.semantic_type.to_string(),
                    reason,
                })?;

            if value.is_null() && column.target.is_required() {
                return Err(RowValidationError::MissingValue {
                    row: record.index,
                    column: column.target.name.clone(),
                });
            }
            values.push(value);
        }

        Ok(ValidatedRow {
            index: record.index,
            values,
        })
    }

    /// Lazily validate a record stream, skipping rejected rows
    pub fn validate_all<I>(&self, records: I) -> ValidatedRows<'_, I>
    where
        I: Iterator<Item = Result<Record, SourceReadError>>,
    {
        ValidatedRows {
            validator: self,
            records,
            rows_read: 0,
            skipped: 0,
            errors: Vec::new(),
            fatal: None,
        }
    }
}

fn find_column(columns: &[String], name: &str) -> Option<usize> {
    columns.iter().position(|c| c == name).or_else(|| {
        columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    })
}

/// Lazy sequence of validated rows with a running count of skipped rows
///
/// A non-row-local source failure ends the sequence; retrieve it with
/// [`ValidatedRows::take_fatal`].
pub struct ValidatedRows<'a, I> {
    validator: &'a SchemaValidator,
    records: I,
    rows_read: usize,
    skipped: usize,
    errors: Vec<RowValidationError>,
    fatal: Option<SourceReadError>,
}

impl<I> ValidatedRows<'_, I> {
    /// Rows read from the source so far
    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    /// Rows rejected so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// First rejection, if any
    pub fn first_error(&self) -> Option<&RowValidationError> {
        self.errors.first()
    }

    /// Retained rejections (capped at [`MAX_RETAINED_ERRORS`])
    pub fn errors(&self) -> &[RowValidationError] {
        &self.errors
    }

    /// Fatal source error that ended the sequence
    pub fn take_fatal(&mut self) -> Option<SourceReadError> {
        self.fatal.take()
    }

    fn reject(&mut self, error: RowValidationError) {
        debug!(row = error.row(), error = %error, "Row rejected");
        self.skipped += 1;
        if self.errors.len() < MAX_RETAINED_ERRORS {
            self.errors.push(error);
        }
    }
}

impl<I> Iterator for ValidatedRows<'_, I>
where
    I: Iterator<Item = Result<Record, SourceReadError>>,
{
    type Item = ValidatedRow;

    fn next(&mut self) -> Option<Self::Item> {
        if self.fatal.is_some() {
            return None;
        }

        loop {
            match self.records.next()? {
                Ok(record) => {
                    self.rows_read += 1;
                    match self.validator.validate(&record) {
                        Ok(row) => return Some(row),
                        Err(e) => self.reject(e),
                    }
                }
                Err(SourceReadError::MalformedRecord { row, reason }) => {
                    self.rows_read += 1;
                    self.reject(RowValidationError::Malformed { row, reason });
                }
                Err(e) => {
                    self.fatal = Some(e);
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SemanticType;
    use crate::source::{CsvOptions, CsvRowSource};

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
            ColumnDef::new("status", SemanticType::Text { max_len: Some(10) }),
        ])
        .unwrap()
    }

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_missing_required_column_is_fatal() {
        let err = SchemaValidator::new(
            &schema(),
            &columns(&["amount", "status"]),
            &ColumnMapping::identity(),
            None,
        )
        .unwrap_err();

        assert_eq!(
            err,
            SchemaError::SchemaMismatch {
                missing: vec!["txn_id".to_string()]
            }
        );
    }

    #[test]
    fn test_missing_nullable_column_is_filled() {
        let validator = SchemaValidator::new(
            &schema(),
            &columns(&["txn_id", "amount"]),
            &ColumnMapping::identity(),
            None,
        )
        .unwrap();

        let src = CsvRowSource::from_reader(
            "txn_id,amount\n1,2.5\n".as_bytes(),
            "inline",
            CsvOptions::default(),
        )
        .unwrap();
        let rows: Vec<_> = validator.validate_all(src).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values[2], Value::Null);
    }

    #[test]
    fn test_rename_and_case_insensitive_identity() {
        let mapping = ColumnMapping::identity().rename("id", "txn_id");
        let validator = SchemaValidator::new(
            &schema(),
            &columns(&["id", "AMOUNT", "Status"]),
            &mapping,
            None,
        )
        .unwrap();

        let src = CsvRowSource::from_reader(
            "id,AMOUNT,Status\n9,1.10,done\n".as_bytes(),
            "inline",
            CsvOptions::default(),
        )
        .unwrap();
        let rows: Vec<_> = validator.validate_all(src).collect();
        assert_eq!(rows[0].values[0], Value::Integer(9));
        assert_eq!(rows[0].values[1].to_string(), "1.10");
        assert_eq!(rows[0].values[2], Value::Text("done".to_string()));
    }

    #[test]
    fn test_mapping_to_unknown_target_is_rejected() {
        let mapping = ColumnMapping::identity().rename("x", "nope");
        let err = SchemaValidator::new(&schema(), &columns(&["txn_id"]), &mapping, None)
            .unwrap_err();
        assert_eq!(err, SchemaError::UnknownTargetColumn("nope".to_string()));
    }

    #[test]
    fn test_bad_rows_are_skipped_not_fatal() {
        let validator = SchemaValidator::new(
            &schema(),
            &columns(&["txn_id", "amount", "status"]),
            &ColumnMapping::identity(),
            None,
        )
        .unwrap();

        let input = "txn_id,amount,status\n\
                     1,10.00,ok\n\
                     ,5.00,ok\n\
                     3,abc,ok\n\
                     4,1.00\n\
                     5,2.00,a-very-long-status\n\
                     6,3.00,ok\n";
        let src =
            CsvRowSource::from_reader(input.as_bytes(), "inline", CsvOptions::default()).unwrap();
        let mut rows = validator.validate_all(src);
        let accepted: Vec<usize> = rows.by_ref().map(|r| r.index).collect();

        assert_eq!(accepted, vec![1, 6]);
        assert_eq!(rows.skipped(), 4);
        assert_eq!(rows.rows_read(), 6);
        assert!(rows.take_fatal().is_none());

        let first = rows.first_error().unwrap();
        assert_eq!(first.row(), 2);
        assert_eq!(first.column(), Some("txn_id"));
        assert!(matches!(
            rows.errors()[1],
            RowValidationError::InvalidValue { row: 3, .. }
        ));
        assert!(matches!(
            rows.errors()[2],
            RowValidationError::Malformed { row: 4, .. }
        ));
    }
}
