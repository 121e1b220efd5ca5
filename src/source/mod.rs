//! Row source: lazy, single-pass reading of tabular input
//!
//! A source yields [`Record`]s in file order together with the ordered input
//! column schema. Cells are untyped text at this point; the
//! [`schema`](crate::schema) validator coerces them to target types.

mod delimited;
mod error;
mod record;

pub use delimited::{CsvOptions, CsvRowSource, hash_file};
pub use error::SourceReadError;
pub use record::{Record, Value};
