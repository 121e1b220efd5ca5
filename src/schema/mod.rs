//! Target schema and schema validation
//!
//! The [`TargetSchema`] is the column order/typing contract for everything
//! downstream of the row source. [`SchemaValidator`] binds it to one input's
//! columns through a [`ColumnMapping`] and coerces each record:
//!
//! - a required target column with no input column is a fatal
//!   [`SchemaError::SchemaMismatch`], raised before any write;
//! - a record that cannot be coerced is a [`RowValidationError`] and is
//!   skipped, never aborting the batch.

mod error;
mod mapping;
mod target;
mod types;
mod validator;

pub use error::{RowValidationError, SchemaError};
pub use mapping::{ColumnMapping, MappingEntry};
pub use target::{ColumnDef, TargetSchema};
pub use types::{MAX_DECIMAL_PRECISION, MAX_DECIMAL_SCALE, SemanticType};
pub use validator::{MAX_RETAINED_ERRORS, SchemaValidator, ValidatedRow, ValidatedRows};
